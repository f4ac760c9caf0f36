use crate::error::{ErrorKind, StoreError};
use crate::protocol::message::{ErrorRecord, Reply, Request};
use crate::protocol::types::{Mode, Operation};
use crate::storage::memory::CacheStore;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Serves requests against the shard store.
///
/// Holds no state besides the store itself. `handle` never fails: validation
/// errors, misses and internal faults all come back as a failed `Reply`.
pub struct Dispatcher {
    store: Arc<dyn CacheStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn handle(&self, request: &Request) -> Reply {
        match panic::catch_unwind(AssertUnwindSafe(|| self.resolve(request))) {
            Ok(reply) => reply,
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                tracing::error!(
                    "Internal fault handling request {} from {}: {}",
                    request.id,
                    request.name,
                    detail
                );
                Reply::failure(
                    request,
                    ErrorRecord::new(ErrorKind::UnknownError)
                        .with_request(request)
                        .with_detail(detail),
                )
            }
        }
    }

    fn resolve(&self, request: &Request) -> Reply {
        if let Err(e) = self.store.bucket_of(&request.key) {
            tracing::debug!("Rejecting request {} from {}: {}", request.id, request.name, e);
            return Reply::failure(request, ErrorRecord::new(e.kind()).with_request(request));
        }

        let mode = request.effective_mode();
        if mode != Mode::Equate {
            tracing::debug!(
                "Rejecting request {} from {}: unsupported mode '{}'",
                request.id,
                request.name,
                mode
            );
            return Reply::failure(
                request,
                ErrorRecord::new(ErrorKind::InvalidMode).with_request(request),
            );
        }

        match request.op {
            Operation::Set => {
                let Some(value) = request.data.clone() else {
                    return Reply::failure(
                        request,
                        ErrorRecord::new(ErrorKind::UnknownError)
                            .with_request(request)
                            .with_detail("set request carries no payload"),
                    );
                };
                match self.store.put(&request.key, value) {
                    Ok(bucket) => {
                        tracing::debug!(
                            "SET {} from {} -> bucket {}",
                            request.key,
                            request.name,
                            bucket
                        );
                        Reply::ack(request)
                    }
                    Err(e) => store_failure(request, e),
                }
            }
            Operation::Get => match self.store.lookup(&request.key) {
                Ok(value) => Reply::value(request, value),
                Err(e) => store_failure(request, e),
            },
        }
    }
}

fn store_failure(request: &Request, error: StoreError) -> Reply {
    match error {
        // Misses are an expected outcome and do not echo the request.
        StoreError::NoSuchKey(_) => Reply::failure(request, ErrorRecord::new(ErrorKind::NoSuchKey)),
        other => Reply::failure(request, ErrorRecord::new(other.kind()).with_request(request)),
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown internal fault".to_string()
    }
}
