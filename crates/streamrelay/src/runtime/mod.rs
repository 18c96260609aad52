//! Hosting loop: pull invocations from the runtime API and run the relay
//! handler on each, one at a time.

pub mod client;

use tracing::{error, info, instrument, warn};

use crate::relay::RelayHandler;

pub use client::{ErrorReport, Invocation, RuntimeClient};

/// Error type for the runtime API loop.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{0} is not set; not running inside a function runtime")]
    NotConfigured(&'static str),

    #[error("Runtime API response carried no request id")]
    MissingRequestId,

    #[error("Runtime API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error type reported for payloads that are not JSON.
pub const INVALID_PAYLOAD_ERROR: &str = "InvalidEventPayload";

/// Serve invocations until fetching the next one fails.
pub async fn serve(handler: &RelayHandler, client: &RuntimeClient) -> Result<(), RuntimeError> {
    info!("Waiting for invocations");
    loop {
        let invocation = client.next_invocation().await?;
        process(handler, client, invocation).await;
    }
}

/// Run one invocation and report its result.
///
/// Reporting failures are logged; the loop keeps serving.
#[instrument(skip_all, fields(request_id = %invocation.request_id))]
pub async fn process(handler: &RelayHandler, client: &RuntimeClient, invocation: Invocation) {
    let event = match serde_json::from_slice::<serde_json::Value>(&invocation.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Invocation payload is not JSON");
            let report = ErrorReport::new(INVALID_PAYLOAD_ERROR, e.to_string());
            if let Err(e) = client.post_error(&invocation.request_id, &report).await {
                error!(error = %e, "Failed to report invocation error");
            }
            return;
        }
    };

    let outcome = handler.handle(event).await;
    info!(status_code = outcome.status_code, "Invocation finished");
    if let Err(e) = client.post_response(&invocation.request_id, &outcome).await {
        error!(error = %e, "Failed to post invocation response");
    }
}
