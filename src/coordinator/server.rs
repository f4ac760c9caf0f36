use super::dispatcher::Dispatcher;
use crate::error::ErrorKind;
use crate::protocol::codec::{self, Envelope, FrameReader, Inbound};
use crate::protocol::message::{ErrorRecord, Reply, Request};
use crate::protocol::types::Operation;

use anyhow::Result;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies one participant connection on the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(pub u64);

/// Coordinator side of the channel.
///
/// Accepts participant connections on the application's socket, hands each
/// decoded request to the dispatcher and writes the reply back on the
/// connection it came from. Requests on one connection are handled in order.
pub struct CoordinatorServer {
    dispatcher: Arc<Dispatcher>,
    listener: UnixListener,
    socket_path: PathBuf,
    connections: DashMap<SocketHandle, mpsc::UnboundedSender<Vec<u8>>>,
    next_handle: AtomicU64,
}

impl CoordinatorServer {
    /// Binds the listening socket, replacing a stale socket file left by a previous run.
    pub fn bind(socket_path: &Path, dispatcher: Arc<Dispatcher>) -> Result<Arc<Self>> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        tracing::info!("Coordinator listening on {}", socket_path.display());

        Ok(Arc::new(Self {
            dispatcher,
            listener,
            socket_path: socket_path.to_path_buf(),
            connections: DashMap::new(),
            next_handle: AtomicU64::new(0),
        }))
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.accept_loop().await;
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Dispatches a request and, when it came from a remote participant, routes the
    /// reply back to that participant. The reply is returned in both cases.
    pub fn on_message(&self, request: Request, socket: Option<SocketHandle>) -> Reply {
        let reply = self.dispatcher.handle(&request);
        if let Some(socket) = socket
            && let Err(e) = self.send_to_participant(socket, &reply)
        {
            tracing::warn!("Failed to deliver reply {} to {:?}: {}", reply.id, socket, e);
        }
        reply
    }

    pub fn send_to_participant(&self, socket: SocketHandle, reply: &Reply) -> Result<()> {
        let frame = codec::encode(&Envelope::MessageReply(reply.clone()))?;
        let connection = self
            .connections
            .get(&socket)
            .ok_or_else(|| anyhow::anyhow!("participant {:?} is not connected", socket))?;
        connection
            .send(frame)
            .map_err(|_| anyhow::anyhow!("connection to {:?} is closed", socket))?;
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let handle = SocketHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(handle, stream).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept participant connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, handle: SocketHandle, stream: UnixStream) {
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.connections.insert(handle, tx);
        tracing::info!("Participant connected ({:?})", handle);

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_half.write_all(&frame).await {
                    tracing::warn!("Failed to write to {:?}: {}", handle, e);
                    break;
                }
            }
        });

        let mut frames = FrameReader::new(BufReader::new(read_half));
        loop {
            match frames.next_frame().await {
                Ok(Some(frame)) => self.on_frame(handle, &frame),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Read error on {:?}: {}", handle, e);
                    break;
                }
            }
        }

        self.connections.remove(&handle);
        let _ = writer.await;
        tracing::info!("Participant disconnected ({:?})", handle);
    }

    fn on_frame(&self, handle: SocketHandle, frame: &[u8]) {
        match codec::decode(frame) {
            Ok(Inbound::Envelope(Envelope::Message(request))) => {
                self.on_message(request, Some(handle));
            }
            Ok(Inbound::Envelope(Envelope::MessageReply(reply))) => {
                tracing::warn!("Ignoring reply {} sent to the coordinator by {:?}", reply.id, handle);
            }
            Ok(Inbound::Malformed { event, data, error }) => {
                self.on_malformed(handle, event.as_deref(), &data, &error);
            }
            Err(e) => {
                tracing::warn!("Dropping undecodable frame from {:?}: {}", handle, e);
            }
        }
    }

    /// Answers a request that could not be decoded, provided its id and operation
    /// can still be read from the raw payload.
    fn on_malformed(
        &self,
        handle: SocketHandle,
        event: Option<&str>,
        data: &serde_json::Value,
        error: &serde_json::Error,
    ) {
        if event != Some(codec::EVENT_MESSAGE) {
            tracing::warn!("Dropping unknown event {:?} from {:?}", event, handle);
            return;
        }

        let id = data.get("id").and_then(serde_json::Value::as_u64);
        let op = data
            .get("op")
            .and_then(|op| serde_json::from_value::<Operation>(op.clone()).ok());
        let (Some(id), Some(op)) = (id, op) else {
            tracing::warn!("Dropping malformed request from {:?}: {}", handle, error);
            return;
        };

        let reply = Reply {
            id,
            name: data
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            op,
            status: false,
            data: None,
            error: Some(
                ErrorRecord::new(ErrorKind::UnknownError)
                    .with_detail(format!("malformed request: {}", error)),
            ),
        };
        if let Err(e) = self.send_to_participant(handle, &reply) {
            tracing::warn!("Failed to deliver reply {} to {:?}: {}", id, handle, e);
        }
    }
}

impl Drop for CoordinatorServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
