//! Coordinator Module
//!
//! Runs in the single process that owns the shard store.
//!
//! ## Request Lifecycle
//! 1. **Receive**: A `Request` arrives from a participant connection, or in-process when the
//!    coordinator issues calls to itself.
//! 2. **Validate**: The key must shard and the mode must be `equate`.
//! 3. **Dispatch**: `set` writes the store, `get` reads it.
//! 4. **Reply**: Exactly one `Reply` is produced per request, including on internal faults.
//!
//! ## Submodules
//! - **`dispatcher`**: Validation and store access; turns every outcome into a reply.
//! - **`server`**: Listens on the application's channel, tracks participant connections and routes replies back.

pub mod dispatcher;
pub mod server;
