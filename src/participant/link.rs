use super::registry::CorrelationRegistry;
use crate::error::{CacheError, CacheResult};
use crate::protocol::codec::{self, Envelope, FrameReader, Inbound};
use crate::protocol::message::Request;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

/// Outbound half of the transport, as seen by the participant bridge.
pub trait CoordinatorLink: Send + Sync {
    fn send_to_coordinator(&self, request: Request) -> CacheResult<()>;
}

const CONNECT_ATTEMPTS: usize = 5;

/// Participant side of the channel, over the coordinator's Unix socket.
///
/// Requests are queued to a writer task; a reader task feeds every reply into the
/// correlation registry. When the connection drops, all pending waiters are failed
/// with `Disconnected`.
pub struct SocketLink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl SocketLink {
    pub async fn connect(socket_path: &Path, registry: Arc<CorrelationRegistry>) -> Result<Self> {
        let stream = connect_with_retry(socket_path, CONNECT_ATTEMPTS).await?;
        tracing::info!("Connected to coordinator at {}", socket_path.display());

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(write_half, rx));
        tokio::spawn(read_loop(read_half, registry, closed.clone()));

        Ok(Self {
            outbound: tx,
            closed,
        })
    }

    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}

impl CoordinatorLink for SocketLink {
    fn send_to_coordinator(&self, request: Request) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Disconnected(
                "coordinator connection closed".to_string(),
            ));
        }
        let frame = codec::encode(&Envelope::Message(request))?;
        self.outbound
            .send(frame)
            .map_err(|_| CacheError::Disconnected("coordinator connection closed".to_string()))
    }
}

async fn connect_with_retry(socket_path: &Path, attempts: usize) -> Result<UnixStream> {
    let mut delay_ms = 150u64;

    for attempt in 0..attempts {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if attempt + 1 == attempts {
                    return Err(anyhow::anyhow!(
                        "failed to connect to {}: {}",
                        socket_path.display(),
                        e
                    ));
                }
                tracing::debug!("Coordinator not reachable yet ({}), retrying", e);
                let jitter = rand::random::<u64>() % 50;
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }
    }

    Err(anyhow::anyhow!("Connect attempts exhausted"))
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_half.write_all(&frame).await {
            tracing::error!("Failed to send to coordinator: {}", e);
            break;
        }
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    registry: Arc<CorrelationRegistry>,
    closed: Arc<AtomicBool>,
) {
    let mut frames = FrameReader::new(BufReader::new(read_half));
    loop {
        match frames.next_frame().await {
            Ok(Some(frame)) => match codec::decode(&frame) {
                Ok(Inbound::Envelope(Envelope::MessageReply(reply))) => {
                    registry.resolve(reply);
                }
                Ok(other) => {
                    tracing::warn!("Ignoring unexpected frame from coordinator: {:?}", other);
                }
                Err(e) => {
                    tracing::warn!("Dropping undecodable frame from coordinator: {}", e);
                }
            },
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Read error on coordinator connection: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    let failed = registry.fail_all("coordinator connection closed");
    tracing::warn!(
        "Coordinator connection closed, failed {} pending request(s)",
        failed
    );
}
