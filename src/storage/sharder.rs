use crate::error::StoreError;

/// Number of buckets in the shard store.
pub const BUCKET_COUNT: usize = 676;

/// Maps a key to one of a fixed number of buckets.
///
/// Placement depends only on the first two UTF-16 code units of the key, so
/// every process computes the same bucket without coordination. The ordinal
/// sum is reduced modulo the bucket count to stay within the store.
#[derive(Debug, Clone, Copy)]
pub struct KeySharder {
    bucket_count: usize,
}

impl KeySharder {
    pub fn new() -> Self {
        Self::with_bucket_count(BUCKET_COUNT)
    }

    /// A zero bucket count is raised to one.
    pub fn with_bucket_count(bucket_count: usize) -> Self {
        Self {
            bucket_count: bucket_count.max(1),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Ordinal of the first character, plus the second one's when present.
    pub fn ordinal_sum(key: &str) -> Option<usize> {
        let mut units = key.encode_utf16();
        let first = units.next()? as usize;
        Some(match units.next() {
            Some(second) => first + second as usize,
            None => first,
        })
    }

    pub fn shard(&self, key: &str) -> Result<usize, StoreError> {
        let sum = Self::ordinal_sum(key).ok_or(StoreError::ImproperKey)?;
        Ok(sum % self.bucket_count)
    }
}

impl Default for KeySharder {
    fn default() -> Self {
        Self::new()
    }
}
