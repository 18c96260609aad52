//! Console transport: writes each payload as one line.
//!
//! Lets `streamrelay invoke --console` show exactly what a client would have
//! received, without a live connection.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{Connection, DeliveryChannel, DeliveryError};

pub struct ConsoleChannel<W = tokio::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleChannel<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> DeliveryChannel for ConsoleChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn post(&self, _connection: &Connection, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut out = self.out.lock().await;
        let write = async {
            out.write_all(payload).await?;
            out.write_all(b"\n").await?;
            out.flush().await
        };
        write
            .await
            .map_err(|e| DeliveryError::Other(format!("console write failed: {e}")))
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_payload() {
        let channel = ConsoleChannel::new(Vec::new());
        let conn = Connection::new("c1");
        channel.post(&conn, b"Hi").await.unwrap();
        channel.post(&conn, b" there").await.unwrap();
        channel.post(&conn, b"EOS").await.unwrap();
        let written = String::from_utf8(channel.into_inner()).unwrap();
        assert_eq!(written, "Hi\n there\nEOS\n");
    }
}
