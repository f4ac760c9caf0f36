use super::link::CoordinatorLink;
use super::registry::CorrelationRegistry;
use crate::coordinator::dispatcher::Dispatcher;
use crate::error::{CacheError, CacheResult, ErrorKind};
use crate::protocol::message::{ErrorRecord, Reply, Request};
use crate::protocol::types::CacheValue;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the bridge sends its requests.
#[derive(Clone)]
pub enum Route {
    /// This process is the coordinator: dispatch without touching the channel.
    InProcess(Arc<Dispatcher>),
    Remote(Arc<dyn CoordinatorLink>),
}

/// Call/response API over the coordinator round trip.
///
/// Correlation ids come from a counter owned by this bridge. They only need to be
/// unique within this process: the coordinator answers on the connection a request
/// arrived on, so ids from different participants never meet in the same registry.
pub struct ParticipantBridge {
    name: String,
    next_id: AtomicU64,
    registry: Arc<CorrelationRegistry>,
    route: Route,
    request_timeout: Duration,
}

impl ParticipantBridge {
    pub fn new(name: &str, registry: Arc<CorrelationRegistry>, route: Route) -> Self {
        Self {
            name: name.to_string(),
            next_id: AtomicU64::new(0),
            registry,
            route,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self.route, Route::InProcess(_))
    }

    /// Stores `value` under `key` on the coordinator.
    pub async fn set(&self, key: &str, value: impl Into<CacheValue>) -> CacheResult<()> {
        let id = self.next_correlation_id();
        // Stored in wire form so the in-process route reads back what a socket peer would
        let request = Request::set(id, &self.name, key, value.into().canonical());
        self.round_trip(request).await?.into_result().map(|_| ())
    }

    /// Fetches the value stored under `key`. A miss fails with a `NoSuchKey` record.
    pub async fn get(&self, key: &str) -> CacheResult<CacheValue> {
        let id = self.next_correlation_id();
        let request = Request::get(id, &self.name, key);
        self.round_trip(request).await?.into_result()?.ok_or_else(|| {
            CacheError::Remote(
                ErrorRecord::new(ErrorKind::UnknownError).with_detail("get reply carried no value"),
            )
        })
    }

    /// Callback form of [`set`](Self::set); the callback receives `Ok(())` or the error.
    pub fn set_with_callback<F>(
        self: &Arc<Self>,
        key: &str,
        value: impl Into<CacheValue>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CacheResult<()>) + Send + 'static,
    {
        let bridge = self.clone();
        let key = key.to_string();
        let value = value.into();
        tokio::spawn(async move {
            callback(bridge.set(&key, value).await);
        })
    }

    /// Callback form of [`get`](Self::get).
    pub fn get_with_callback<F>(self: &Arc<Self>, key: &str, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(CacheResult<CacheValue>) + Send + 'static,
    {
        let bridge = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            callback(bridge.get(&key).await);
        })
    }

    /// Inbound reply delivery. Replies nobody waits for are ignored.
    pub fn on_reply(&self, reply: Reply) -> bool {
        self.registry.resolve(reply)
    }

    /// Sends a prepared request and waits for its reply.
    ///
    /// The waiter is registered before the request leaves, so a reply can never
    /// arrive ahead of it.
    pub async fn round_trip(&self, request: Request) -> CacheResult<Reply> {
        let id = request.id;
        let waiter = self.registry.register(id)?;
        tracing::debug!("{} {} (id {})", request.op, request.key, id);

        match &self.route {
            Route::InProcess(dispatcher) => {
                let reply = dispatcher.handle(&request);
                self.on_reply(reply);
            }
            Route::Remote(link) => {
                if let Err(e) = link.send_to_coordinator(request) {
                    self.registry.cancel(id);
                    return Err(e);
                }
            }
        }

        match tokio::time::timeout(self.request_timeout, waiter).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CacheError::Disconnected(format!(
                "waiter for request {} was dropped",
                id
            ))),
            Err(_) => {
                self.registry.cancel(id);
                tracing::warn!("Request {} timed out after {:?}", id, self.request_timeout);
                Err(CacheError::Timeout { id })
            }
        }
    }

    pub fn next_correlation_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}
