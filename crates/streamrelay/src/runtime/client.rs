//! Lambda Runtime API client.
//!
//! Speaks the plain-HTTP protocol the hosting environment exposes at
//! `AWS_LAMBDA_RUNTIME_API`: long-poll for the next invocation, then post
//! either a response or an error for it.

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::debug;

use streamrelay_core::Outcome;

use super::RuntimeError;

/// Environment variable holding the `host:port` of the runtime API.
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

const API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// One invocation handed out by the runtime API.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: String,
    /// Raw event payload.
    pub payload: Vec<u8>,
}

/// Error body understood by the runtime API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_message: String,
    pub error_type: String,
}

impl ErrorReport {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            error_type: error_type.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeClient {
    http: reqwest::Client,
    base_url: String,
}

impl RuntimeClient {
    /// Client for the runtime API at `api` (`host:port`, as found in
    /// `AWS_LAMBDA_RUNTIME_API`).
    pub fn new(api: &str) -> Self {
        Self::with_http(api, reqwest::Client::new())
    }

    pub fn with_http(api: &str, http: reqwest::Client) -> Self {
        let api = api.trim_end_matches('/');
        let base_url = if api.starts_with("http://") || api.starts_with("https://") {
            format!("{api}/{API_VERSION}/runtime")
        } else {
            format!("http://{api}/{API_VERSION}/runtime")
        };
        Self { http, base_url }
    }

    /// Client for the runtime API named by [`RUNTIME_API_ENV`].
    pub fn from_env() -> Result<Self, RuntimeError> {
        let api = std::env::var(RUNTIME_API_ENV)
            .map_err(|_| RuntimeError::NotConfigured(RUNTIME_API_ENV))?;
        Ok(Self::new(&api))
    }

    fn next_url(&self) -> String {
        format!("{}/invocation/next", self.base_url)
    }

    fn response_url(&self, request_id: &str) -> String {
        format!("{}/invocation/{request_id}/response", self.base_url)
    }

    fn error_url(&self, request_id: &str) -> String {
        format!("{}/invocation/{request_id}/error", self.base_url)
    }

    fn init_error_url(&self) -> String {
        format!("{}/init/error", self.base_url)
    }

    /// Block until the next invocation is available.
    pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let response = self
            .http
            .get(self.next_url())
            .send()
            .await?
            .error_for_status()?;
        let request_id = request_id_from(response.headers())?;
        let payload = response.bytes().await?.to_vec();
        debug!(request_id = %request_id, bytes = payload.len(), "Received invocation");
        Ok(Invocation {
            request_id,
            payload,
        })
    }

    /// Report the handler's outcome for `request_id`.
    pub async fn post_response(
        &self,
        request_id: &str,
        outcome: &Outcome,
    ) -> Result<(), RuntimeError> {
        self.http
            .post(self.response_url(request_id))
            .json(outcome)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Report that `request_id` could not be handled at all.
    pub async fn post_error(
        &self,
        request_id: &str,
        report: &ErrorReport,
    ) -> Result<(), RuntimeError> {
        self.http
            .post(self.error_url(request_id))
            .header(ERROR_TYPE_HEADER, report.error_type.as_str())
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Report a failure during startup, before any invocation was taken.
    pub async fn post_init_error(&self, report: &ErrorReport) -> Result<(), RuntimeError> {
        self.http
            .post(self.init_error_url())
            .header(ERROR_TYPE_HEADER, report.error_type.as_str())
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn request_id_from(headers: &HeaderMap) -> Result<String, RuntimeError> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(RuntimeError::MissingRequestId)
}
