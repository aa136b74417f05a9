//! Fail-open behavior under a broken backing store.
//!
//! The cache must never be a source of request failure: every store error
//! or timeout degrades to a miss on read and a skipped write on set.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use reel_cache::cache::key::{CallerRole, QueryParams, ResourceType};
use reel_cache::cache::manager::CacheManager;
use reel_cache::cache::metrics::MetricsCollector;
use reel_cache::cache::policy::PolicyStore;
use reel_cache::config::Config;
use reel_cache::store::{KeyValueStore, StoreError, StoreInfo};

/// A store where every call fails immediately.
struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn set_ex(&self, _key: &str, _ttl: u64, _value: Bytes) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn del(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn del_many(&self, _keys: &[String]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn ttl(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn memory_usage(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn info(&self) -> Result<StoreInfo, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// A store where every call hangs past any reasonable timeout.
struct HangingStore;

#[async_trait]
impl KeyValueStore for HangingStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
        futures::future::pending().await
    }
    async fn set_ex(&self, _key: &str, _ttl: u64, _value: Bytes) -> Result<(), StoreError> {
        futures::future::pending().await
    }
    async fn del(&self, _key: &str) -> Result<(), StoreError> {
        futures::future::pending().await
    }
    async fn del_many(&self, _keys: &[String]) -> Result<(), StoreError> {
        futures::future::pending().await
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
        futures::future::pending().await
    }
    async fn ttl(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        futures::future::pending().await
    }
    async fn memory_usage(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        futures::future::pending().await
    }
    async fn info(&self) -> Result<StoreInfo, StoreError> {
        futures::future::pending().await
    }
}

fn manager_over(store: Arc<dyn KeyValueStore>) -> CacheManager {
    let config = Arc::new(Config::default());
    let policy = Arc::new(PolicyStore::new(config.clone(), store.clone()));
    CacheManager::new(config, store, policy)
}

#[tokio::test]
async fn test_broken_store_never_fails_callers() {
    let manager = manager_over(Arc::new(BrokenStore));

    // Every get is Absent and every set returns; nothing panics or errors
    // across a sustained run.
    for i in 0..1000 {
        let params = QueryParams::for_owner(format!("user-{i}"));
        let got: Option<serde_json::Value> =
            manager.get(ResourceType::Dashboard, &params).await;
        assert!(got.is_none());

        manager
            .set(ResourceType::Dashboard, &params, &json!({"n": i}), CallerRole::Viewer)
            .await;
    }
}

#[tokio::test]
async fn test_broken_store_invalidation_is_swallowed() {
    let manager = manager_over(Arc::new(BrokenStore));
    manager
        .invalidate(ResourceType::Trending, &QueryParams::for_owner("user-1"))
        .await;
    manager.invalidate_type(ResourceType::Trending).await;
    manager.invalidate_owner("user-1").await;
}

#[tokio::test(start_paused = true)]
async fn test_hanging_store_is_bounded_by_timeout() {
    let manager = manager_over(Arc::new(HangingStore));
    let params = QueryParams::for_owner("user-1");

    // With the clock paused, these only complete because the op timeout
    // fires; an unbounded call would hang the test.
    let got: Option<serde_json::Value> = manager.get(ResourceType::Dashboard, &params).await;
    assert!(got.is_none());

    manager
        .set(ResourceType::Dashboard, &params, &json!(1), CallerRole::Viewer)
        .await;
}

#[tokio::test]
async fn test_broken_store_metrics_snapshot_is_empty() {
    let config = Arc::new(Config::default());
    let metrics = MetricsCollector::new(config, Arc::new(BrokenStore));

    let snapshot = metrics.snapshot().await;
    assert_eq!(snapshot.total_keys, 0);
    assert_eq!(snapshot.memory_usage_bytes, 0);
}
