//! Bedrock Agents runtime backend.

use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::Client;
use aws_sdk_bedrockagentruntime::error::DisplayErrorContext;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use tracing::{debug, instrument};

use super::{AgentError, AgentEvent, AgentRequest, AgentService, AgentStream};

/// Invokes a Bedrock agent and exposes its completion as an [`AgentStream`].
#[derive(Debug, Clone)]
pub struct BedrockAgent {
    client: Client,
}

impl BedrockAgent {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl AgentService for BedrockAgent {
    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    async fn invoke(&self, request: AgentRequest) -> Result<AgentStream, AgentError> {
        let output = self
            .client
            .invoke_agent()
            .agent_id(request.agent_id)
            .agent_alias_id(request.agent_alias_id)
            .session_id(request.session_id)
            .input_text(request.input)
            .send()
            .await
            .map_err(|e| AgentError::Invoke(DisplayErrorContext(e).to_string()))?;

        debug!("Bedrock agent invoked, reading completion stream");

        let mut completion = output.completion;
        let stream = async_stream::stream! {
            loop {
                match completion.recv().await {
                    Ok(Some(event)) => yield Ok(convert_event(event)),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(AgentError::Stream(DisplayErrorContext(e).to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "bedrock"
    }
}

fn convert_event(event: ResponseStream) -> AgentEvent {
    match event {
        ResponseStream::Chunk(part) => AgentEvent::Chunk(
            part.bytes()
                .map(|blob| blob.as_ref().to_vec())
                .unwrap_or_default(),
        ),
        ResponseStream::Trace(_) => AgentEvent::Other("trace".into()),
        ResponseStream::ReturnControl(_) => AgentEvent::Other("returnControl".into()),
        _ => AgentEvent::Other("unknown".into()),
    }
}
