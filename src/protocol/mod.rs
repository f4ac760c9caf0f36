//! Cache Wire Protocol
//!
//! Defines the vocabulary exchanged between participants and the coordinator.
//!
//! ## Contents
//! - **`types`**: Cached values, operation codes and request modes.
//! - **`message`**: The correlated `Request` / `Reply` pair and the error record a failed reply carries.
//! - **`codec`**: Envelope framing used on the shared channel (JSON documents separated by a form feed).

pub mod codec;
pub mod message;
pub mod types;
