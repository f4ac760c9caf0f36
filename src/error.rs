//! Cache Error Taxonomy
//!
//! Every failure a caller can observe is classified by an [`ErrorKind`]. The kinds
//! that travel inside a [`Reply`](crate::protocol::message::Reply) keep the numbering
//! participants already expect on the wire (`errNo`); the remaining kinds are raised
//! locally by the participant side and never cross the channel.

use crate::protocol::message::ErrorRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Classification of a cache failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Request used a mode other than `equate`.
    InvalidMode,
    /// Empty key.
    ImproperKey,
    /// Internal fault on the coordinator while handling a request.
    UnknownError,
    /// `get` on a key that was never stored.
    NoSuchKey,
    /// No reply arrived before the request deadline.
    Timeout,
    /// A correlation id was registered twice.
    DuplicateCorrelation,
    /// The channel to the coordinator closed or rejected the request.
    Disconnected,
}

impl ErrorKind {
    pub fn err_no(self) -> u32 {
        match self {
            ErrorKind::InvalidMode => 0,
            ErrorKind::ImproperKey => 1,
            ErrorKind::UnknownError => 2,
            ErrorKind::NoSuchKey => 3,
            ErrorKind::Timeout => 4,
            ErrorKind::DuplicateCorrelation => 5,
            ErrorKind::Disconnected => 6,
        }
    }

    pub fn from_err_no(err_no: u32) -> Option<Self> {
        match err_no {
            0 => Some(ErrorKind::InvalidMode),
            1 => Some(ErrorKind::ImproperKey),
            2 => Some(ErrorKind::UnknownError),
            3 => Some(ErrorKind::NoSuchKey),
            4 => Some(ErrorKind::Timeout),
            5 => Some(ErrorKind::DuplicateCorrelation),
            6 => Some(ErrorKind::Disconnected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidMode => "InvalidMode",
            ErrorKind::ImproperKey => "ImproperKey",
            ErrorKind::UnknownError => "UnknownError",
            ErrorKind::NoSuchKey => "NoSuchKey",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::DuplicateCorrelation => "DuplicateCorrelation",
            ErrorKind::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to callers of the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The coordinator answered with a failure reply.
    #[error("{}", describe_remote(.0))]
    Remote(ErrorRecord),

    /// No reply for the request within the configured deadline.
    #[error("request {id} timed out waiting for a reply")]
    Timeout { id: u64 },

    /// A waiter for this correlation id already exists.
    #[error("correlation id {id} is already registered")]
    DuplicateCorrelation { id: u64 },

    /// Channel closed or send failed before a reply arrived.
    #[error("disconnected from coordinator: {0}")]
    Disconnected(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Remote(record) => record.error_kind,
            CacheError::Timeout { .. } => ErrorKind::Timeout,
            CacheError::DuplicateCorrelation { .. } => ErrorKind::DuplicateCorrelation,
            CacheError::Disconnected(_) => ErrorKind::Disconnected,
            CacheError::Codec(_) | CacheError::Io(_) => ErrorKind::UnknownError,
        }
    }

    /// True for a `get` miss, so callers can tell "absent" apart from "failed".
    pub fn is_no_such_key(&self) -> bool {
        self.kind() == ErrorKind::NoSuchKey
    }
}

/// Failures raised by the shard store. The dispatcher turns them into reply records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("improper key: keys must be non-empty")]
    ImproperKey,

    #[error("no such key: {0}")]
    NoSuchKey(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ImproperKey => ErrorKind::ImproperKey,
            StoreError::NoSuchKey(_) => ErrorKind::NoSuchKey,
        }
    }
}

fn describe_remote(record: &ErrorRecord) -> String {
    match &record.detail {
        Some(detail) => format!("{} (errNo {}): {}", record.error_kind, record.err_no, detail),
        None => format!("{} (errNo {})", record.error_kind, record.err_no),
    }
}
