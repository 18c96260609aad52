//! Relay handler.
//!
//! Flow per invocation:
//! 1. Validate the event. Bad input returns 400 and, when the connection is
//!    known, pushes an error frame. The agent is not contacted.
//! 2. Open a fresh agent session (UUIDv4) and invoke the agent once.
//! 3. Push every content chunk in arrival order. Delivery failures are logged
//!    by the [`Deliverer`] and the loop moves on to the next chunk.
//! 4. Push the terminal sentinel once the agent stream is exhausted.
//!
//! Any agent or decode failure in steps 2-4 ends the relay with 500 and a
//! best-effort error frame; the sentinel is not sent in that case.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::{Span, debug, error, field, info, instrument, warn};
use uuid::Uuid;

use streamrelay_core::{ClientFrame, InvocationEvent, Outcome, RelayConfig, RequestContext};

use crate::agent::{AgentError, AgentEvent, AgentRequest, AgentService};
use crate::delivery::{Connection, DeliveryChannel, DeliveryOutcome, Deliverer};

/// Message returned to the platform on success.
pub const COMPLETED_MESSAGE: &str = "Streaming completed";

/// Failures that end a relay with a server error.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Agent chunk is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

/// Per-invocation counters, logged when the relay finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub session_id: String,
    /// Content chunks received from the agent.
    pub chunks: usize,
    /// Content chunks the client accepted.
    pub delivered: usize,
    /// Blank chunks that were not pushed.
    pub skipped: usize,
    /// Content chunks whose push failed.
    pub failed: usize,
    /// Non-content agent events.
    pub ignored: usize,
    pub sentinel_delivered: bool,
}

impl RelayStats {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Skipped => self.skipped += 1,
            DeliveryOutcome::Gone | DeliveryOutcome::Malformed | DeliveryOutcome::Failed => {
                self.failed += 1;
            }
        }
    }
}

/// Relays one query per invocation from the agent to the client connection.
///
/// Holds only immutable, shareable handles; one instance serves every
/// invocation of the process.
#[derive(Clone)]
pub struct RelayHandler {
    agent: Arc<dyn AgentService>,
    deliverer: Deliverer,
    agent_id: String,
    agent_alias_id: String,
}

impl RelayHandler {
    pub fn new(
        config: &RelayConfig,
        agent: Arc<dyn AgentService>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            agent,
            deliverer: Deliverer::new(channel, config.encoding, config.sentinel()),
            agent_id: config.agent_id.clone(),
            agent_alias_id: config.agent_alias_id.clone(),
        }
    }

    /// Handle a raw JSON invocation event.
    ///
    /// An event that does not decode is still answered on its connection when
    /// `requestContext` can be read on its own.
    pub async fn handle(&self, event: serde_json::Value) -> Outcome {
        let context = RequestContext::from_event_value(&event);
        match InvocationEvent::from_value(event) {
            Ok(event) => self.handle_event(&event).await,
            Err(e) => {
                let partial = InvocationEvent {
                    request_context: context,
                    body: None,
                };
                self.reject(&partial, &e).await
            }
        }
    }

    /// Handle a decoded invocation event.
    #[instrument(
        skip_all,
        fields(connection_id = field::Empty, session_id = field::Empty)
    )]
    pub async fn handle_event(&self, event: &InvocationEvent) -> Outcome {
        let request = match event.relay_request() {
            Ok(request) => request,
            Err(e) => return self.reject(event, &e).await,
        };

        Span::current().record("connection_id", request.connection_id.as_str());
        let connection = Connection::new(request.connection_id).with_endpoint(request.endpoint);

        match self.relay(&connection, request.input).await {
            Ok(stats) => {
                info!(
                    agent = self.agent.name(),
                    chunks = stats.chunks,
                    delivered = stats.delivered,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    ignored = stats.ignored,
                    sentinel_delivered = stats.sentinel_delivered,
                    "Relay completed"
                );
                Outcome::ok(COMPLETED_MESSAGE)
            }
            Err(e) => {
                error!(agent = self.agent.name(), error = %e, "Relay failed");
                let message = format!("An internal error occurred: {e}");
                self.deliverer
                    .deliver(&connection, &ClientFrame::Error(message.clone()))
                    .await;
                Outcome::internal_error(&message)
            }
        }
    }

    /// Answer an event that cannot be relayed, notifying its connection if
    /// one is known.
    async fn reject(&self, event: &InvocationEvent, err: &streamrelay_core::Error) -> Outcome {
        let message = err.to_string();
        warn!(error = %err, "Rejecting invocation");
        if let Some(connection_id) = event.connection_id() {
            Span::current().record("connection_id", connection_id);
            let connection =
                Connection::new(connection_id).with_endpoint(event.callback_endpoint());
            self.deliverer
                .deliver(&connection, &ClientFrame::Error(message.clone()))
                .await;
        }
        if err.is_client_error() {
            Outcome::bad_request(&message)
        } else {
            Outcome::internal_error(&message)
        }
    }

    /// Invoke the agent once and stream its answer to `connection`.
    pub async fn relay(
        &self,
        connection: &Connection,
        input: String,
    ) -> Result<RelayStats, RelayError> {
        let session_id = Uuid::new_v4().to_string();
        Span::current().record("session_id", session_id.as_str());

        let mut stats = RelayStats {
            session_id: session_id.clone(),
            ..RelayStats::default()
        };

        debug!(input_len = input.len(), "Invoking agent");
        let mut stream = self
            .agent
            .invoke(AgentRequest {
                agent_id: self.agent_id.clone(),
                agent_alias_id: self.agent_alias_id.clone(),
                session_id,
                input,
            })
            .await?;

        while let Some(event) = stream.next().await {
            match event? {
                AgentEvent::Chunk(bytes) => {
                    stats.chunks += 1;
                    let text = String::from_utf8(bytes)?;
                    let outcome = self
                        .deliverer
                        .deliver(connection, &ClientFrame::Chunk(text))
                        .await;
                    stats.record(outcome);
                }
                AgentEvent::Other(kind) => {
                    debug!(kind = %kind, "Ignoring non-content agent event");
                    stats.ignored += 1;
                }
            }
        }

        stats.sentinel_delivered = self
            .deliverer
            .deliver(connection, &ClientFrame::End)
            .await
            .is_delivered();

        Ok(stats)
    }
}
