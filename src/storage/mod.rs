//! Shard Storage Module
//!
//! Holds the cached entries on the coordinator.
//!
//! ## Core Concepts
//! - **Sharding**: `KeySharder` places a key in one of a fixed number of buckets using only its first two characters.
//! - **Buckets**: `ShardStore` keeps one independent map per bucket; a key lives in exactly one of them.
//! - **Ownership**: Only the coordinator dispatcher reads or mutates the store, through the `CacheStore` trait.

pub mod memory;
pub mod sharder;

#[cfg(test)]
mod tests;
