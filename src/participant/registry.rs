//! Correlation Registry
//!
//! Pairs each in-flight request with the single waiter that will receive its reply.
//! An entry is removed at the moment it fires, so a waiter resolves at most once and
//! a second delivery for the same id finds nothing.

use crate::error::{CacheError, CacheResult};
use crate::protocol::message::Reply;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;

/// What a waiter eventually receives.
pub type ReplyOutcome = CacheResult<Reply>;

pub struct CorrelationRegistry {
    pending: DashMap<u64, oneshot::Sender<ReplyOutcome>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Registers a waiter for `id`.
    ///
    /// A second registration for a live id means the id generator is broken, so it
    /// fails with `DuplicateCorrelation` and leaves the existing waiter untouched.
    pub fn register(&self, id: u64) -> CacheResult<oneshot::Receiver<ReplyOutcome>> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => {
                tracing::error!("Correlation id {} registered twice", id);
                Err(CacheError::DuplicateCorrelation { id })
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Delivers a reply to its waiter. Returns `false` when nobody is waiting.
    pub fn resolve(&self, reply: Reply) -> bool {
        let id = reply.id;
        self.complete(id, Ok(reply))
    }

    /// Fails the waiter for `id` with `error`.
    pub fn fail(&self, id: u64, error: CacheError) -> bool {
        self.complete(id, Err(error))
    }

    /// Removes the waiter for `id` without firing it.
    pub fn cancel(&self, id: u64) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Fails every pending waiter, e.g. when the channel to the coordinator closes.
    pub fn fail_all(&self, reason: &str) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.fail(*id, CacheError::Disconnected(reason.to_string())))
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    fn complete(&self, id: u64, outcome: ReplyOutcome) -> bool {
        let Some((_, waiter)) = self.pending.remove(&id) else {
            tracing::warn!("No waiter for correlation id {}, ignoring delivery", id);
            return false;
        };
        if waiter.send(outcome).is_err() {
            // The caller stopped waiting; the entry is still consumed.
            tracing::debug!("Waiter for correlation id {} already gone", id);
        }
        true
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
