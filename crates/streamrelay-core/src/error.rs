//! Error types for the `streamrelay` core library.

use thiserror::Error;

/// Result type alias using the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for relay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound event could not be turned into a relay request
    #[error("Invalid invocation event: {0}")]
    InvalidEvent(String),

    /// The request body parsed but carried no usable input
    #[error("No input provided")]
    MissingInput,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was caused by the caller's input rather than the relay.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidEvent(_) | Self::MissingInput)
    }
}
