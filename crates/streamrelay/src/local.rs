//! Local invocation input for `streamrelay invoke`.

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::debug;

use streamrelay_core::Result;

/// Read one invocation event from `path`, or from stdin when no path is given.
pub async fn read_event(path: Option<&Path>) -> Result<serde_json::Value> {
    let bytes = match path {
        Some(path) => {
            debug!(path = %path.display(), "Reading event file");
            tokio::fs::read(path).await?
        }
        None => {
            debug!("Reading event from stdin");
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
    };
    Ok(serde_json::from_slice(&bytes)?)
}
