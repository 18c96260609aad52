//! Offline agent that streams the query back word by word.
//!
//! Used by `streamrelay invoke --echo` to exercise the relay end to end
//! without credentials.

use std::time::Duration;

use async_trait::async_trait;

use super::{AgentError, AgentEvent, AgentRequest, AgentService, AgentStream};

#[derive(Debug, Clone, Default)]
pub struct EchoAgent {
    delay: Duration,
}

impl EchoAgent {
    pub const fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    /// Pause between chunks to mimic incremental generation.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Split `input` into chunks that keep their trailing whitespace, so that
/// concatenating them restores the input exactly.
pub fn split_chunks(input: &str) -> Vec<String> {
    input
        .split_inclusive(char::is_whitespace)
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl AgentService for EchoAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentStream, AgentError> {
        let chunks = split_chunks(&request.input);
        let delay = self.delay;
        let stream = async_stream::stream! {
            for chunk in chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(AgentEvent::Chunk(chunk.into_bytes()));
            }
        };
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "echo"
    }
}
