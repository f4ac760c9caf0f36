//! Channel Framing
//!
//! Each message on the shared channel is a JSON envelope `{"type": <event>, "data": <payload>}`
//! followed by a single form-feed byte. JSON escapes control characters inside strings,
//! so the delimiter never appears within a document.

use super::message::{Reply, Request};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const FRAME_DELIMITER: u8 = 0x0C;

/// Event name for requests travelling to the coordinator.
pub const EVENT_MESSAGE: &str = "message";
/// Event name for replies travelling back to a participant.
pub const EVENT_MESSAGE_REPLY: &str = "messageReply";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Envelope {
    #[serde(rename = "message")]
    Message(Request),
    #[serde(rename = "messageReply")]
    MessageReply(Reply),
}

/// Result of decoding one inbound frame.
#[derive(Debug)]
pub enum Inbound {
    Envelope(Envelope),
    /// Valid JSON that is not a well-formed envelope. The raw payload is kept so
    /// the receiver can still recover the correlation id and answer.
    Malformed {
        event: Option<String>,
        data: serde_json::Value,
        error: serde_json::Error,
    },
}

pub fn encode(envelope: &Envelope) -> serde_json::Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(envelope)?;
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Decodes a frame (without its delimiter). Fails only when the bytes are not JSON.
pub fn decode(frame: &[u8]) -> serde_json::Result<Inbound> {
    let raw: serde_json::Value = serde_json::from_slice(frame)?;
    match Envelope::deserialize(&raw) {
        Ok(envelope) => Ok(Inbound::Envelope(envelope)),
        Err(error) => Ok(Inbound::Malformed {
            event: raw
                .get("type")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            data: raw.get("data").cloned().unwrap_or(serde_json::Value::Null),
            error,
        }),
    }
}

/// Splits a byte stream into delimiter-terminated frames.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(4096),
        }
    }

    /// Returns the next non-empty frame, or `None` once the stream is exhausted.
    /// Trailing bytes without a delimiter at end of stream are returned as a final frame.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            self.buf.clear();
            let read = self.inner.read_until(FRAME_DELIMITER, &mut self.buf).await?;
            if read == 0 {
                return Ok(None);
            }
            if self.buf.last() == Some(&FRAME_DELIMITER) {
                self.buf.pop();
            }
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(std::mem::take(&mut self.buf)));
        }
    }
}
