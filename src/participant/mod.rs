//! Participant Module
//!
//! Turns local `set`/`get` calls into correlated round trips to the coordinator.
//!
//! ## Request Flow
//! 1. **Allocate**: The bridge takes the next id from its own counter.
//! 2. **Register**: A one-shot waiter for that id is placed in the correlation registry
//!    before anything is sent, so an early reply always finds it.
//! 3. **Send**: The request goes over the link, or straight to the dispatcher when this
//!    process is the coordinator.
//! 4. **Resolve**: The matching reply fires the waiter exactly once. A deadline removes
//!    the waiter and fails the call with `Timeout` if no reply comes.
//!
//! ## Submodules
//! - **`registry`**: Correlation id to one-shot waiter table.
//! - **`bridge`**: The call/response API (`set`, `get` and their callback forms).
//! - **`link`**: Participant side of the channel.

pub mod bridge;
pub mod link;
pub mod registry;
