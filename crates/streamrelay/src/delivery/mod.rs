//! Push delivery to client connections.
//!
//! [`DeliveryChannel`] is the raw transport: it posts bytes to a connection
//! and reports typed failures. [`Deliverer`] is what the relay calls: it
//! frames the message, skips blank payloads, and absorbs every failure into a
//! logged [`DeliveryOutcome`] so that a broken connection can never abort the
//! relay loop.

pub mod apigw;
pub mod console;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use streamrelay_core::frame::is_blank_payload;
use streamrelay_core::{ClientFrame, FrameEncoding};

pub use apigw::ApiGatewayChannel;
pub use console::ConsoleChannel;

/// Where a push goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub connection_id: String,
    /// Connection-management endpoint taken from the inbound event, if any.
    pub endpoint: Option<String>,
}

impl Connection {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            endpoint: None,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }
}

/// Errors a delivery transport can report.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The client disconnected; later pushes to this id will fail too.
    #[error("Connection gone: {0}")]
    Gone(String),

    /// The request itself was rejected (bad endpoint, oversized payload,
    /// missing permissions).
    #[error("Malformed delivery request: {0}")]
    Malformed(String),

    #[error("Delivery failed: {0}")]
    Other(String),
}

/// Transport that pushes bytes to a connection.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn post(&self, connection: &Connection, payload: &[u8]) -> Result<(), DeliveryError>;

    /// Transport name for logs.
    fn name(&self) -> &str;
}

/// Result of one delivery attempt. Used for logging and tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Blank payload, nothing was sent.
    Skipped,
    Gone,
    Malformed,
    Failed,
}

impl DeliveryOutcome {
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Frames and pushes client messages, never failing.
#[derive(Clone)]
pub struct Deliverer {
    channel: Arc<dyn DeliveryChannel>,
    encoding: FrameEncoding,
    sentinel: String,
}

impl Deliverer {
    pub fn new(
        channel: Arc<dyn DeliveryChannel>,
        encoding: FrameEncoding,
        sentinel: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            encoding,
            sentinel: sentinel.into(),
        }
    }

    /// Push `frame` to `connection`.
    ///
    /// Blank payloads are skipped with a warning. Failures are classified and
    /// logged here and never returned to the caller.
    pub async fn deliver(&self, connection: &Connection, frame: &ClientFrame) -> DeliveryOutcome {
        let payload = self.encoding.encode(frame, &self.sentinel);
        if is_blank_payload(&payload) {
            warn!(
                connection_id = %connection.connection_id,
                kind = frame.kind(),
                "Skipping delivery of blank payload"
            );
            return DeliveryOutcome::Skipped;
        }

        match self.channel.post(connection, &payload).await {
            Ok(()) => {
                debug!(
                    connection_id = %connection.connection_id,
                    kind = frame.kind(),
                    bytes = payload.len(),
                    "Frame delivered"
                );
                DeliveryOutcome::Delivered
            }
            Err(DeliveryError::Gone(e)) => {
                warn!(
                    connection_id = %connection.connection_id,
                    channel = self.channel.name(),
                    error = %e,
                    "Client connection no longer exists"
                );
                DeliveryOutcome::Gone
            }
            Err(DeliveryError::Malformed(e)) => {
                error!(
                    connection_id = %connection.connection_id,
                    channel = self.channel.name(),
                    error = %e,
                    "Delivery request rejected as malformed"
                );
                DeliveryOutcome::Malformed
            }
            Err(DeliveryError::Other(e)) => {
                error!(
                    connection_id = %connection.connection_id,
                    channel = self.channel.name(),
                    error = %e,
                    "Failed to deliver frame to client"
                );
                DeliveryOutcome::Failed
            }
        }
    }
}
