//! The relay handler: one invocation in, one agent call, chunks pushed out.

pub mod handler;

#[cfg(test)]
mod handler_tests;

pub use handler::{RelayError, RelayHandler, RelayStats};
