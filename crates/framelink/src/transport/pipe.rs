// Pipe transport: length-prefixed JSON envelopes over an AsyncRead/AsyncWrite
// pair, for embedding a guest that runs in a separate process.
//
// Each frame is a 4-byte little-endian length followed by the JSON bytes of
// an { origin, message } envelope. Sender identity is the pipe itself (one
// peer per connection). The origin is asserted by the sending endpoint, not
// by a platform, so the channel's origin check acts as a policy filter here.

use super::{ContextId, Delivery, MessageSink};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Transport-level frame: the asserted sender origin plus the wire message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    origin: String,
    message: Value,
}

/// Write one length-prefixed envelope.
pub async fn send_envelope<W>(writer: &mut W, origin: &str, message: Value) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let envelope = Envelope {
        origin: origin.to_string(),
        message,
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| Error::TransportError(format!("Failed to serialize envelope: {e}")))?;

    let length = bytes.len() as u32;
    writer
        .write_all(&length.to_le_bytes())
        .await
        .map_err(|e| Error::TransportError(format!("Failed to write length: {e}")))?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| Error::TransportError(format!("Failed to write envelope: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::TransportError(format!("Failed to flush: {e}")))?;

    Ok(())
}

/// Sending half of a pipe transport. `origin` is stamped on every outgoing
/// envelope.
pub struct PipeSink<W> {
    writer: W,
    origin: String,
}

impl<W> PipeSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, origin: &str) -> Self {
        Self {
            writer,
            origin: origin.to_string(),
        }
    }
}

impl<W> MessageSink for PipeSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn post(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let origin = self.origin.clone();
            send_envelope(&mut self.writer, &origin, message).await
        })
    }
}

/// Receiving half of a pipe transport: reads envelopes until the pipe closes
/// and forwards them as deliveries from `peer`.
pub struct PipeReceiver<R> {
    reader: R,
    peer: ContextId,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl<R> PipeReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, peer: ContextId, deliveries: mpsc::UnboundedSender<Delivery>) -> Self {
        Self {
            reader,
            peer,
            deliveries,
        }
    }

    /// Run the read loop. Returns `Ok(())` on EOF between envelopes or when
    /// the delivery stream is dropped; errors on a torn frame.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let mut len_buf = [0u8; 4];
            match self.reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => {
                    return Err(Error::TransportError(format!(
                        "Failed to read length prefix: {e}"
                    )));
                }
            }
            let length = u32::from_le_bytes(len_buf) as usize;

            let mut buf = vec![0u8; length];
            self.reader
                .read_exact(&mut buf)
                .await
                .map_err(|e| Error::TransportError(format!("Failed to read envelope: {e}")))?;

            let envelope: Envelope = serde_json::from_slice(&buf)
                .map_err(|e| Error::TransportError(format!("Failed to parse envelope: {e}")))?;

            let delivery = Delivery {
                sender: self.peer,
                origin: envelope.origin,
                payload: envelope.message,
            };
            if self.deliveries.send(delivery).is_err() {
                // Manager gone; nothing left to deliver to.
                return Ok(());
            }
        }
    }
}
