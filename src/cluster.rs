//! Role-selected wiring of the cache for one process.

use crate::config::{CacheConfig, Role};
use crate::coordinator::dispatcher::Dispatcher;
use crate::coordinator::server::CoordinatorServer;
use crate::error::CacheResult;
use crate::participant::bridge::{ParticipantBridge, Route};
use crate::participant::link::SocketLink;
use crate::participant::registry::CorrelationRegistry;
use crate::protocol::types::CacheValue;
use crate::storage::memory::ShardStore;

use anyhow::Result;
use std::sync::Arc;

/// The cache as seen by one process of the cluster.
///
/// On the coordinator this owns the shard store and the listening server, and
/// local calls are dispatched in-process. On a participant it owns the link to
/// the coordinator. Either way callers use the same `set`/`get` API.
pub struct ClusterCache {
    config: CacheConfig,
    bridge: Arc<ParticipantBridge>,
    store: Option<Arc<ShardStore>>,
    server: Option<Arc<CoordinatorServer>>,
}

impl ClusterCache {
    pub async fn start(config: CacheConfig) -> Result<Self> {
        let registry = Arc::new(CorrelationRegistry::new());
        let socket_path = config.socket_path();

        let (route, store, server) = match config.role {
            Role::Coordinator => {
                let store = Arc::new(ShardStore::new());
                let dispatcher = Arc::new(Dispatcher::new(store.clone()));
                let server = CoordinatorServer::bind(&socket_path, dispatcher.clone())?;
                server.clone().start();
                (Route::InProcess(dispatcher), Some(store), Some(server))
            }
            Role::Participant => {
                let link = SocketLink::connect(&socket_path, registry.clone()).await?;
                (Route::Remote(Arc::new(link)), None, None)
            }
        };

        let bridge = ParticipantBridge::new(config.process_name(), registry, route)
            .with_timeout(config.request_timeout);
        tracing::info!(
            "Cache '{}' started as {:?} ({})",
            config.app_name,
            config.role,
            bridge.name()
        );

        Ok(Self {
            config,
            bridge: Arc::new(bridge),
            store,
            server,
        })
    }

    pub async fn set(&self, key: &str, value: impl Into<CacheValue>) -> CacheResult<()> {
        self.bridge.set(key, value).await
    }

    pub async fn get(&self, key: &str) -> CacheResult<CacheValue> {
        self.bridge.get(key).await
    }

    pub fn bridge(&self) -> &Arc<ParticipantBridge> {
        &self.bridge
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The shard store, on the coordinator only.
    pub fn store(&self) -> Option<&Arc<ShardStore>> {
        self.store.as_ref()
    }

    /// The listening server, on the coordinator only.
    pub fn server(&self) -> Option<&Arc<CoordinatorServer>> {
        self.server.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::codec::{self, Envelope, FrameReader, Inbound};
    use crate::protocol::message::{Reply, Request};
    use crate::protocol::types::Mode;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    fn test_config(app_name: &str, role: Role) -> CacheConfig {
        CacheConfig::new(app_name, role)
            .with_socket_root(std::env::temp_dir())
            .with_participant_name("worker-1")
            .with_request_timeout(Duration::from_secs(2))
    }

    fn unique_app() -> String {
        format!("test-{}", uuid::Uuid::new_v4().simple())
    }

    async fn raw_round_trip(cache: &ClusterCache, frame: &[u8]) -> Reply {
        let stream = UnixStream::connect(cache.config().socket_path()).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(frame).await.unwrap();

        let mut frames = FrameReader::new(BufReader::new(read_half));
        let reply_frame = tokio::time::timeout(Duration::from_secs(2), frames.next_frame())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match codec::decode(&reply_frame).unwrap() {
            Inbound::Envelope(Envelope::MessageReply(reply)) => reply,
            other => panic!("expected a reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_participant_round_trip_over_socket() {
        // ARRANGE
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();
        let participant = ClusterCache::start(test_config(&app, Role::Participant))
            .await
            .unwrap();

        // ACT
        participant.set("ab", "hello").await.unwrap();
        let value = participant.get("ab").await.unwrap();

        // ASSERT
        assert_eq!(value, CacheValue::from("hello"));
        let store = coordinator.store().unwrap();
        assert_eq!(store.bucket_len('a' as usize + 'b' as usize), 1);

        // The coordinator sees the same data through its in-process path
        assert_eq!(coordinator.get("ab").await.unwrap(), CacheValue::from("hello"));
        assert_eq!(coordinator.bridge().name(), "master");
        assert!(participant.store().is_none());
        assert_eq!(coordinator.server().unwrap().connection_count(), 1);
    }

    #[tokio::test]
    async fn test_participant_errors_over_socket() {
        let app = unique_app();
        let _coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();
        let participant = ClusterCache::start(test_config(&app, Role::Participant))
            .await
            .unwrap();

        let miss = participant.get("zz").await.unwrap_err();
        assert!(miss.is_no_such_key());

        let improper = participant.set("", "x").await.unwrap_err();
        assert_eq!(improper.kind(), ErrorKind::ImproperKey);

        assert_eq!(participant.bridge().registry().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_every_value_shape_survives_the_socket() {
        // ARRANGE
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();
        let participant = ClusterCache::start(test_config(&app, Role::Participant))
            .await
            .unwrap();
        let values = vec![
            CacheValue::from("text"),
            CacheValue::from(42.5),
            CacheValue::Bytes(vec![1, 2, 3]),
            CacheValue::Bytes(vec![]),
            CacheValue::Object(json!([1, 2, 3])),
            CacheValue::Object(json!({"title": "Rust", "tags": ["a", "b"]})),
            CacheValue::Object(json!(true)),
            CacheValue::Object(json!(null)),
        ];

        for (i, value) in values.into_iter().enumerate() {
            let local_key = format!("l{}", i);
            let remote_key = format!("r{}", i);

            // ACT
            coordinator.set(&local_key, value.clone()).await.unwrap();
            participant.set(&remote_key, value.clone()).await.unwrap();

            // ASSERT: both routes read back the stored value from either side
            assert_eq!(participant.get(&local_key).await.unwrap(), value);
            assert_eq!(coordinator.get(&local_key).await.unwrap(), value);
            assert_eq!(participant.get(&remote_key).await.unwrap(), value);
            assert_eq!(coordinator.get(&remote_key).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_values_in_another_variants_shape_read_back_alike() {
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();
        let participant = ClusterCache::start(test_config(&app, Role::Participant))
            .await
            .unwrap();

        coordinator.set("aa", CacheValue::Object(json!("s"))).await.unwrap();
        participant.set("bb", CacheValue::Object(json!(5))).await.unwrap();

        assert_eq!(coordinator.get("aa").await.unwrap(), CacheValue::from("s"));
        assert_eq!(participant.get("aa").await.unwrap(), CacheValue::from("s"));
        assert_eq!(coordinator.get("bb").await.unwrap(), CacheValue::Number(5.0));
        assert_eq!(participant.get("bb").await.unwrap(), CacheValue::Number(5.0));
    }

    #[tokio::test]
    async fn test_concurrent_participants() {
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();

        let mut tasks = vec![];
        for p in 0..4 {
            let config = test_config(&app, Role::Participant)
                .with_participant_name(&format!("worker-{}", p));
            tasks.push(tokio::spawn(async move {
                let cache = ClusterCache::start(config).await.unwrap();
                for i in 0..25 {
                    let key = format!("p{}-{}", p, i);
                    cache.set(&key, CacheValue::from(i as u32)).await.unwrap();
                }
                for i in 0..25 {
                    let key = format!("p{}-{}", p, i);
                    assert_eq!(cache.get(&key).await.unwrap(), CacheValue::Number(i as f64));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(coordinator.store().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_stream_mode_rejected_over_socket() {
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();

        let request = Request::set(41, "raw", "ab", CacheValue::from("chunk")).with_mode(Mode::Stream);
        let frame = codec::encode(&Envelope::Message(request)).unwrap();

        let reply = raw_round_trip(&coordinator, &frame).await;

        assert_eq!(reply.id, 41);
        assert!(!reply.status);
        assert_eq!(reply.error_kind(), Some(ErrorKind::InvalidMode));
        assert!(coordinator.store().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_string_mode_rejected_as_invalid_mode() {
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();

        let mut frame = br#"{"type":"message","data":{"id":12,"name":"raw","op":"set","mode":5,"key":"ab","data":"x"}}"#.to_vec();
        frame.push(codec::FRAME_DELIMITER);

        let reply = raw_round_trip(&coordinator, &frame).await;

        assert_eq!(reply.id, 12);
        assert!(!reply.status);
        assert_eq!(reply.error_kind(), Some(ErrorKind::InvalidMode));
        assert!(coordinator.store().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_request_still_gets_a_reply() {
        let app = unique_app();
        let coordinator = ClusterCache::start(test_config(&app, Role::Coordinator))
            .await
            .unwrap();

        // `key` is missing, so the request cannot be decoded
        let mut frame = br#"{"type":"message","data":{"id":9,"name":"raw","op":"get"}}"#.to_vec();
        frame.push(codec::FRAME_DELIMITER);

        let reply = raw_round_trip(&coordinator, &frame).await;

        assert_eq!(reply.id, 9);
        assert_eq!(reply.name, "raw");
        assert_eq!(reply.error_kind(), Some(ErrorKind::UnknownError));
        assert!(reply.error.unwrap().detail.unwrap().contains("malformed request"));
    }

    #[tokio::test]
    async fn test_participant_without_coordinator_fails_to_start() {
        let config = test_config(&unique_app(), Role::Participant);

        let result = ClusterCache::start(config).await;

        assert!(result.is_err());
    }
}
