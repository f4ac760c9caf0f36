//! Storage Module Tests
//!
//! Validates key placement and the bucket maps held by the coordinator.
//!
//! ## Test Scopes
//! - **Sharder**: Deterministic placement, the two-character rule, range reduction and key validation.
//! - **ShardStore**: Put/lookup round-trips, overwrites, misses and bucket isolation.

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::protocol::types::CacheValue;
    use crate::storage::memory::{CacheStore, ShardStore};
    use crate::storage::sharder::{BUCKET_COUNT, KeySharder};
    use serde_json::json;

    // ============================================================
    // SHARDER TESTS
    // ============================================================

    #[test]
    fn test_single_character_key_uses_its_ordinal() {
        let sharder = KeySharder::new();
        assert_eq!(sharder.shard("a").unwrap(), 97);
        assert_eq!(sharder.shard("Z").unwrap(), 90);
    }

    #[test]
    fn test_two_character_key_sums_ordinals() {
        let sharder = KeySharder::new();
        assert_eq!(sharder.shard("ab").unwrap(), 'a' as usize + 'b' as usize);
    }

    #[test]
    fn test_only_first_two_characters_matter() {
        let sharder = KeySharder::new();
        let base = sharder.shard("ab").unwrap();

        assert_eq!(sharder.shard("abc").unwrap(), base);
        assert_eq!(sharder.shard("ab_some_long_suffix").unwrap(), base);
    }

    #[test]
    fn test_empty_key_is_improper() {
        let sharder = KeySharder::new();
        assert_eq!(sharder.shard(""), Err(StoreError::ImproperKey));
    }

    #[test]
    fn test_large_ordinals_wrap_into_range() {
        let sharder = KeySharder::new();

        // U+01FF is 511; 511 + 511 = 1022 exceeds the bucket array
        let bucket = sharder.shard("\u{1FF}\u{1FF}").unwrap();
        assert_eq!(bucket, 1022 % BUCKET_COUNT);

        for key in ["zz", "~~", "\u{4E2D}\u{6587}", "\u{1F600}"] {
            let bucket = sharder.shard(key).unwrap();
            assert!(
                bucket < BUCKET_COUNT,
                "Bucket {} for {:?} should be < {}",
                bucket,
                key,
                BUCKET_COUNT
            );
        }
    }

    #[test]
    fn test_custom_bucket_count() {
        let sharder = KeySharder::with_bucket_count(10);
        assert_eq!(sharder.bucket_count(), 10);
        assert_eq!(sharder.shard("a").unwrap(), 97 % 10);

        assert_eq!(KeySharder::with_bucket_count(0).bucket_count(), 1);
    }

    #[test]
    fn test_sharding_is_stable_across_many_keys() {
        let first = KeySharder::new();
        let second = KeySharder::new();

        for i in 0..1000 {
            let key = format!("key_{}", i);
            assert_eq!(first.shard(&key), second.shard(&key));
        }
    }

    // ============================================================
    // SHARD STORE TESTS
    // ============================================================

    #[test]
    fn test_store_has_fixed_bucket_count() {
        let store = ShardStore::new();
        assert_eq!(store.bucket_count(), BUCKET_COUNT);
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_then_lookup_round_trip() {
        // ARRANGE
        let store = ShardStore::new();
        let value = CacheValue::Object(json!({"title": "Rust Programming", "pages": 560}));

        // ACT
        let bucket = store.put("book-001", value.clone()).unwrap();

        // ASSERT
        assert_eq!(bucket, 'b' as usize + 'o' as usize);
        assert_eq!(store.lookup("book-001").unwrap(), value);
        assert_eq!(store.bucket_len(bucket), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_overwrites_existing_value() {
        let store = ShardStore::new();

        store.put("ab", CacheValue::from("first")).unwrap();
        store.put("ab", CacheValue::from("second")).unwrap();

        assert_eq!(store.lookup("ab").unwrap(), CacheValue::from("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lookup_missing_key() {
        let store = ShardStore::new();

        assert_eq!(
            store.lookup("zz"),
            Err(StoreError::NoSuchKey("zz".to_string()))
        );
        assert_eq!(store.lookup(""), Err(StoreError::ImproperKey));
    }

    #[test]
    fn test_put_rejects_empty_key() {
        let store = ShardStore::new();

        assert_eq!(
            store.put("", CacheValue::from("x")),
            Err(StoreError::ImproperKey)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_colliding_keys_share_a_bucket_without_clobbering() {
        let store = ShardStore::new();

        // "ab" and "ba" have equal ordinal sums
        let b1 = store.put("ab", CacheValue::from(1.0)).unwrap();
        let b2 = store.put("ba", CacheValue::from(2.0)).unwrap();
        assert_eq!(b1, b2);

        assert_eq!(store.lookup("ab").unwrap(), CacheValue::Number(1.0));
        assert_eq!(store.lookup("ba").unwrap(), CacheValue::Number(2.0));
        assert_eq!(store.bucket_len(b1), 2);
        assert_eq!(store.occupied_buckets(), 1);
    }

    #[test]
    fn test_key_lives_in_exactly_one_bucket() {
        let store = ShardStore::new();
        store.put("hello", CacheValue::from("world")).unwrap();

        let holders: Vec<usize> = (0..store.bucket_count())
            .filter(|&bucket| {
                store
                    .dump_bucket(bucket)
                    .iter()
                    .any(|(key, _)| key == "hello")
            })
            .collect();

        assert_eq!(holders, vec![store.bucket_of("hello").unwrap()]);
        assert!(store.contains("hello"));
        assert!(!store.contains("help"));
    }

    #[test]
    fn test_concurrent_writers_on_separate_buckets() {
        let store = std::sync::Arc::new(ShardStore::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("{}{}_{}", (b'a' + t as u8) as char, t, i);
                        store.put(&key, CacheValue::from(i as u32)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 800);
        assert_eq!(store.lookup("c2_99").unwrap(), CacheValue::Number(99.0));
    }
}
