//! Frames pushed to the client connection.
//!
//! With [`FrameEncoding::Json`] every push is a small JSON object:
//! `{"chunk": "..."}` for content, `{"chunk": "[DONE]"}` for end of stream,
//! `{"error": "..."}` for failures. [`FrameEncoding::Raw`] pushes bare text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default end-of-stream marker for JSON-framed clients.
pub const JSON_SENTINEL: &str = "[DONE]";
/// Default end-of-stream marker for raw-text clients.
pub const RAW_SENTINEL: &str = "EOS";

/// One message destined for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// A piece of generated text.
    Chunk(String),
    /// Terminal sentinel: no more chunks will follow.
    End,
    /// Error notification.
    Error(String),
}

/// Whether an encoded payload carries no visible text and should not be pushed.
///
/// Applies to the bytes on the wire: a JSON frame wrapping a lone space is
/// not blank, a raw one is.
pub fn is_blank_payload(payload: &[u8]) -> bool {
    String::from_utf8_lossy(payload).trim().is_empty()
}

impl ClientFrame {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Chunk(_) => "chunk",
            Self::End => "end",
            Self::Error(_) => "error",
        }
    }
}

/// How frames are serialized onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEncoding {
    #[default]
    Json,
    Raw,
}

impl FrameEncoding {
    /// Sentinel used when none is configured explicitly.
    pub const fn default_sentinel(self) -> &'static str {
        match self {
            Self::Json => JSON_SENTINEL,
            Self::Raw => RAW_SENTINEL,
        }
    }

    /// Serialize `frame`, using `sentinel` for [`ClientFrame::End`].
    pub fn encode(self, frame: &ClientFrame, sentinel: &str) -> Vec<u8> {
        match self {
            Self::Json => {
                let value = match frame {
                    ClientFrame::Chunk(text) => serde_json::json!({ "chunk": text }),
                    ClientFrame::End => serde_json::json!({ "chunk": sentinel }),
                    ClientFrame::Error(message) => serde_json::json!({ "error": message }),
                };
                value.to_string().into_bytes()
            }
            Self::Raw => match frame {
                ClientFrame::Chunk(text) => text.clone().into_bytes(),
                ClientFrame::End => sentinel.as_bytes().to_vec(),
                ClientFrame::Error(message) => format!("[ERROR] {message}").into_bytes(),
            },
        }
    }
}

impl FromStr for FrameEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "raw" | "text" => Ok(Self::Raw),
            other => Err(Error::Config(format!(
                "unknown frame encoding '{other}' (expected 'json' or 'raw')"
            ))),
        }
    }
}

impl fmt::Display for FrameEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Raw => f.write_str("raw"),
        }
    }
}
