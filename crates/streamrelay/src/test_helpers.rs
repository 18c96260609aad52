//! In-memory doubles for the agent and delivery seams.
//!
//! Shared by the unit tests in this crate and, through the `test-utils`
//! feature, by the integration tests under `tests/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::agent::{AgentError, AgentEvent, AgentRequest, AgentService, AgentStream};
use crate::delivery::{Connection, DeliveryChannel, DeliveryError};

/// How a [`RecordingChannel`] push should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    Gone,
    Malformed,
    Other,
}

impl FailMode {
    fn to_error(self) -> DeliveryError {
        match self {
            Self::Gone => DeliveryError::Gone("GoneException".into()),
            Self::Malformed => DeliveryError::Malformed("BadRequest".into()),
            Self::Other => DeliveryError::Other("connection reset".into()),
        }
    }
}

/// Delivery channel that records successful pushes and can be told to fail.
#[derive(Default)]
pub struct RecordingChannel {
    posts: Mutex<Vec<(String, Vec<u8>)>>,
    attempts: AtomicUsize,
    fail_all: Mutex<Option<FailMode>>,
    fail_at: Mutex<HashMap<usize, FailMode>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every push from now on.
    pub async fn fail_all(&self, mode: FailMode) {
        *self.fail_all.lock().await = Some(mode);
    }

    /// Fail only the push attempt with the given zero-based index.
    pub async fn fail_on(&self, attempt: usize, mode: FailMode) {
        self.fail_at.lock().await.insert(attempt, mode);
    }

    /// Successful pushes as `(connection_id, payload)`.
    pub async fn posts(&self) -> Vec<(String, Vec<u8>)> {
        self.posts.lock().await.clone()
    }

    /// Successful payloads decoded as UTF-8.
    pub async fn texts(&self) -> Vec<String> {
        self.posts
            .lock()
            .await
            .iter()
            .map(|(_, payload)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }

    /// Push attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn post(&self, connection: &Connection, payload: &[u8]) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(mode) = *self.fail_all.lock().await {
            return Err(mode.to_error());
        }
        if let Some(mode) = self.fail_at.lock().await.get(&attempt).copied() {
            return Err(mode.to_error());
        }
        self.posts
            .lock()
            .await
            .push((connection.connection_id.clone(), payload.to_vec()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// What a [`ScriptedAgent`] does when invoked.
#[derive(Debug, Clone)]
enum Script {
    /// Yield these events in order. `Err` items become stream failures.
    Events(Vec<Result<AgentEvent, String>>),
    /// Reject the call outright.
    FailInvoke(String),
}

/// Agent double that replays a fixed script and records every request.
pub struct ScriptedAgent {
    script: Script,
    calls: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    /// Answer with these text chunks.
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::events(
            chunks
                .iter()
                .map(|c| Ok(AgentEvent::Chunk(c.as_bytes().to_vec())))
                .collect(),
        )
    }

    /// Answer with an arbitrary event sequence.
    pub fn events(events: Vec<Result<AgentEvent, String>>) -> Self {
        Self {
            script: Script::Events(events),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the invocation itself.
    pub fn failing(message: &str) -> Self {
        Self {
            script: Script::FailInvoke(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<AgentRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AgentService for ScriptedAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentStream, AgentError> {
        self.calls.lock().await.push(request);
        match &self.script {
            Script::FailInvoke(message) => Err(AgentError::Invoke(message.clone())),
            Script::Events(events) => {
                let events: Vec<Result<AgentEvent, AgentError>> = events
                    .iter()
                    .cloned()
                    .map(|item| item.map_err(AgentError::Stream))
                    .collect();
                Ok(Box::pin(tokio_stream::iter(events)))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
