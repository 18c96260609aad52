//! streamrelay
//!
//! Relays a managed agent's streamed answer to a client push connection:
//! - Agent backends behind the `AgentService` seam (Bedrock, offline echo)
//! - Delivery transports behind the `DeliveryChannel` seam (API Gateway, console)
//! - The relay handler that ties one invocation to one agent session
//! - A Lambda Runtime API loop and a local one-shot invoker

pub mod agent;
pub mod aws;
pub mod delivery;
pub mod local;
pub mod relay;
pub mod runtime;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
