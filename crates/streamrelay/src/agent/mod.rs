//! Managed agent service seam.
//!
//! The relay submits one query per invocation and consumes the ordered
//! event stream the service returns. Only [`AgentEvent::Chunk`] carries
//! content; every other event kind is surfaced so it can be logged and
//! skipped.

pub mod bedrock;
pub mod echo;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

pub use bedrock::BedrockAgent;
pub use echo::EchoAgent;

/// One query against the agent, scoped to a single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    /// Fresh per invocation; never reused.
    pub session_id: String,
    pub input: String,
}

/// Event produced by the agent while answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Raw bytes of one piece of the answer.
    Chunk(Vec<u8>),
    /// Any non-content event (traces, return-of-control, ...), by kind.
    Other(String),
}

/// Lazily produced, ordered stream of agent events.
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// A service that answers a text query with a stream of events.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Submit `request`. Called exactly once per invocation; never retried.
    async fn invoke(&self, request: AgentRequest) -> Result<AgentStream, AgentError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The call itself was rejected or could not be sent.
    #[error("Agent invocation failed: {0}")]
    Invoke(String),

    /// The call was accepted but the response stream broke.
    #[error("Agent response stream failed: {0}")]
    Stream(String),
}
