//! Cluster Cache Library
//!
//! An in-memory key-value cache shared by the processes of a cluster. One process, the
//! coordinator, holds the data; every other process reaches it through correlated
//! request/reply messages on a shared local channel.
//!
//! ## Architecture Modules
//! - **`storage`**: Key sharding and the fixed array of bucket maps that hold the entries.
//! - **`protocol`**: Requests, replies, error records and the channel framing.
//! - **`coordinator`**: The dispatcher that serves requests against the store, and the server
//!   that accepts participant connections.
//! - **`participant`**: The correlation registry and the bridge that turns `set`/`get` calls
//!   into round trips.
//! - **`cluster`**: `ClusterCache`, which wires the pieces for the process's role.
//! - **`config`** / **`error`**: Process configuration and the error taxonomy.

pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod participant;
pub mod protocol;
pub mod storage;

pub use cluster::ClusterCache;
pub use config::{CacheConfig, Role};
pub use error::{CacheError, CacheResult, ErrorKind};
pub use protocol::types::CacheValue;
