use super::sharder::KeySharder;
use crate::error::StoreError;
use crate::protocol::types::CacheValue;

use dashmap::DashMap;

/// Storage seam used by the coordinator dispatcher.
pub trait CacheStore: Send + Sync {
    /// Bucket the key belongs to; fails for keys that cannot be sharded.
    fn bucket_of(&self, key: &str) -> Result<usize, StoreError>;

    /// Inserts or overwrites an entry, returning the bucket it landed in.
    fn put(&self, key: &str, value: CacheValue) -> Result<usize, StoreError>;

    fn lookup(&self, key: &str) -> Result<CacheValue, StoreError>;
}

/// Fixed array of independent key/value maps, one per shard bucket.
///
/// Created once when the coordinator starts and never resized. Each bucket
/// carries its own locking, so requests arriving on different connections may
/// touch different buckets concurrently. There is no eviction or expiry.
pub struct ShardStore {
    sharder: KeySharder,
    buckets: Vec<DashMap<String, CacheValue>>,
}

impl ShardStore {
    pub fn new() -> Self {
        Self::with_sharder(KeySharder::new())
    }

    pub fn with_sharder(sharder: KeySharder) -> Self {
        let buckets = (0..sharder.bucket_count()).map(|_| DashMap::new()).collect();
        Self { sharder, buckets }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets.get(bucket).map(|map| map.len()).unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        match self.sharder.shard(key) {
            Ok(bucket) => self.buckets[bucket].contains_key(key),
            Err(_) => false,
        }
    }

    /// Snapshot of a single bucket's entries.
    pub fn dump_bucket(&self, bucket: usize) -> Vec<(String, CacheValue)> {
        let mut entries = Vec::new();
        if let Some(map) = self.buckets.get(bucket) {
            for entry in map.iter() {
                entries.push((entry.key().clone(), entry.value().clone()));
            }
        }
        entries
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|map| map.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|map| map.is_empty())
    }

    /// Number of buckets holding at least one entry.
    pub fn occupied_buckets(&self) -> usize {
        self.buckets.iter().filter(|map| !map.is_empty()).count()
    }
}

impl Default for ShardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for ShardStore {
    fn bucket_of(&self, key: &str) -> Result<usize, StoreError> {
        self.sharder.shard(key)
    }

    fn put(&self, key: &str, value: CacheValue) -> Result<usize, StoreError> {
        let bucket = self.sharder.shard(key)?;
        self.buckets[bucket].insert(key.to_string(), value);
        tracing::debug!("Stored key in bucket {}", bucket);
        Ok(bucket)
    }

    fn lookup(&self, key: &str) -> Result<CacheValue, StoreError> {
        let bucket = self.sharder.shard(key)?;
        self.buckets[bucket]
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NoSuchKey(key.to_string()))
    }
}
