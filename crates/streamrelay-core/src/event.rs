//! Inbound invocation events and the outcomes returned to the invoking platform.
//!
//! The event shape follows the API Gateway WebSocket proxy integration:
//!
//! ```json
//! {
//!   "requestContext": { "connectionId": "abc=", "domainName": "...", "stage": "dev" },
//!   "body": "{\"input\": \"hello\"}"
//! }
//! ```
//!
//! `body` is itself a JSON document encoded as a string.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// HTTP-equivalent status for a completed relay.
pub const STATUS_OK: u16 = 200;
/// HTTP-equivalent status for a request rejected because of its input.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// HTTP-equivalent status for an unexpected failure.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Raw invocation event as delivered by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    #[serde(default)]
    pub request_context: Option<RequestContext>,
    /// JSON-encoded request body.
    #[serde(default)]
    pub body: Option<String>,
}

/// Connection metadata attached to the event by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub route_key: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Recover the request context from an event that does not decode as a
    /// whole, e.g. one whose `body` is an object rather than a string.
    pub fn from_event_value(event: &serde_json::Value) -> Option<Self> {
        event
            .get("requestContext")
            .and_then(|ctx| serde_json::from_value(ctx.clone()).ok())
    }
}

/// Body fields the relay understands. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RequestBody {
    #[serde(default)]
    input: Option<serde_json::Value>,
}

/// A validated request: where to push, and what to ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub connection_id: String,
    /// Push endpoint derived from the event, if it carried one.
    pub endpoint: Option<String>,
    pub input: String,
}

impl InvocationEvent {
    /// Decode an event from an arbitrary JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidEvent(e.to_string()))
    }

    /// The destination connection, if the event names a non-empty one.
    pub fn connection_id(&self) -> Option<&str> {
        self.request_context
            .as_ref()
            .and_then(|ctx| ctx.connection_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// The connection-management endpoint for the API that delivered this event,
    /// built as `https://{domainName}/{stage}`.
    pub fn callback_endpoint(&self) -> Option<String> {
        let ctx = self.request_context.as_ref()?;
        let domain = ctx.domain_name.as_deref().filter(|d| !d.is_empty())?;
        match ctx.stage.as_deref().filter(|s| !s.is_empty()) {
            Some(stage) => Some(format!("https://{domain}/{stage}")),
            None => Some(format!("https://{domain}")),
        }
    }

    /// Validate the event into a [`RelayRequest`].
    ///
    /// A missing body is treated as `{}`, so it surfaces as
    /// [`Error::MissingInput`] like an absent `input` field.
    pub fn relay_request(&self) -> Result<RelayRequest> {
        let connection_id = self
            .connection_id()
            .ok_or_else(|| Error::InvalidEvent("missing requestContext.connectionId".into()))?
            .to_string();

        let raw_body = self.body.as_deref().unwrap_or("{}");
        let body: RequestBody = serde_json::from_str(raw_body)
            .map_err(|e| Error::InvalidEvent(format!("body is not a JSON object: {e}")))?;

        let input = match body.input {
            None | Some(serde_json::Value::Null) => return Err(Error::MissingInput),
            Some(serde_json::Value::String(s)) => s,
            Some(_) => return Err(Error::InvalidEvent("`input` must be a string".into())),
        };
        if input.is_empty() {
            return Err(Error::MissingInput);
        }

        Ok(RelayRequest {
            connection_id,
            endpoint: self.callback_endpoint(),
            input,
        })
    }
}

/// Result handed back to the invoking platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub status_code: u16,
    /// JSON-encoded body carrying either `message` or `error`.
    pub body: String,
}

impl Outcome {
    pub fn ok(message: &str) -> Self {
        Self {
            status_code: STATUS_OK,
            body: serde_json::json!({ "message": message }).to_string(),
        }
    }

    pub fn bad_request(error: &str) -> Self {
        Self {
            status_code: STATUS_BAD_REQUEST,
            body: serde_json::json!({ "error": error }).to_string(),
        }
    }

    pub fn internal_error(error: &str) -> Self {
        Self {
            status_code: STATUS_INTERNAL_ERROR,
            body: serde_json::json!({ "error": error }).to_string(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}
