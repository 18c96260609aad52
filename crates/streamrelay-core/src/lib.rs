//! `streamrelay` Core Library
//!
//! Shared functionality for the relay:
//! - Inbound invocation event parsing and invocation outcomes
//! - Client-facing frame encoding (content, end-of-stream, error)
//! - Configuration resolution behind the `ConfigProvider` seam
//! - Common error types and tracing setup

pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod tracing_init;

pub use config::{ConfigProvider, RelayConfig};
pub use error::{Error, Result};
pub use event::{InvocationEvent, Outcome, RelayRequest, RequestContext};
pub use frame::{ClientFrame, FrameEncoding};
