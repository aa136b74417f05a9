//! Operational metrics: point-in-time snapshots of global cache state.
//!
//! Nothing is accumulated in-process. Every snapshot is computed on demand
//! from the backing store's own counters and key enumeration, so every
//! process sharing the store observes identical numbers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::cache::key::{type_pattern, ResourceType, KEY_PREFIX};
use crate::config::Config;
use crate::store::{KeyValueStore, StoreError};

/// Entries inspected when estimating the compression ratio. The envelope
/// flag lives in the stored bytes, so measuring it means reading entries;
/// a bounded sample keeps the snapshot cheap.
const COMPRESSION_SAMPLE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub memory_usage_bytes: u64,
    pub total_keys: usize,
    pub keys_by_type: HashMap<String, usize>,
    /// Fraction of sampled entries stored compressed.
    pub compression_ratio: f64,
}

pub struct MetricsCollector {
    store: Arc<dyn KeyValueStore>,
    op_timeout: Duration,
}

impl MetricsCollector {
    pub fn new(config: Arc<Config>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            op_timeout: Duration::from_millis(config.store.op_timeout_ms),
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Compute a snapshot. Store failures yield a default (zeroed) snapshot
    /// rather than an error; metrics share the layer's fail-open posture.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        match self.try_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Metrics snapshot failed, returning empty snapshot");
                MetricsSnapshot::default()
            }
        }
    }

    async fn try_snapshot(&self) -> Result<MetricsSnapshot, StoreError> {
        let info = self.bounded(self.store.info()).await?;
        let lookups = info.hits + info.misses;
        let (hit_rate, miss_rate) = if lookups > 0 {
            (
                info.hits as f64 / lookups as f64,
                info.misses as f64 / lookups as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let all_keys = self
            .bounded(self.store.keys(&format!("{KEY_PREFIX}:*")))
            .await?;

        let mut keys_by_type = HashMap::new();
        for resource_type in ResourceType::ALL {
            let keys = self
                .bounded(self.store.keys(&type_pattern(resource_type)))
                .await?;
            keys_by_type.insert(resource_type.as_str().to_string(), keys.len());
        }

        let mut sampled = 0usize;
        let mut compressed = 0usize;
        for key in all_keys.iter().take(COMPRESSION_SAMPLE_LIMIT) {
            if let Some(entry) = self.bounded(self.store.get(key)).await? {
                if let Some(&flag) = entry.first() {
                    sampled += 1;
                    if flag == 1 {
                        compressed += 1;
                    }
                }
            }
        }
        let compression_ratio = if sampled > 0 {
            compressed as f64 / sampled as f64
        } else {
            0.0
        };

        Ok(MetricsSnapshot {
            hit_rate,
            miss_rate,
            memory_usage_bytes: info.used_memory_bytes,
            total_keys: all_keys.len(),
            keys_by_type,
            compression_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{CallerRole, QueryParams};
    use crate::cache::manager::CacheManager;
    use crate::cache::policy::PolicyStore;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn harness() -> (Arc<CacheManager>, MetricsCollector) {
        let config = Arc::new(Config::default());
        let store = Arc::new(MemoryStore::new());
        let policy = Arc::new(PolicyStore::new(config.clone(), store.clone()));
        let manager = Arc::new(CacheManager::new(config.clone(), store.clone(), policy));
        let metrics = MetricsCollector::new(config, store);
        (manager, metrics)
    }

    #[tokio::test]
    async fn test_snapshot_counts_keys_by_type() {
        let (manager, metrics) = harness();

        for i in 0..3 {
            manager
                .set(
                    ResourceType::Dashboard,
                    &QueryParams::for_owner(format!("user-{i}")),
                    &json!({"views": i}),
                    CallerRole::Viewer,
                )
                .await;
        }
        manager
            .set(
                ResourceType::Trending,
                &QueryParams::for_owner("global"),
                &json!({"top": []}),
                CallerRole::Viewer,
            )
            .await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.total_keys, 4);
        assert_eq!(snapshot.keys_by_type["dashboard"], 3);
        assert_eq!(snapshot.keys_by_type["trending"], 1);
        assert!(snapshot.memory_usage_bytes > 0);
    }

    #[tokio::test]
    async fn test_hit_and_miss_rates() {
        let (manager, metrics) = harness();
        let params = QueryParams::for_owner("user-1");

        manager
            .set(ResourceType::Dashboard, &params, &json!(1), CallerRole::Viewer)
            .await;

        let _: Option<serde_json::Value> =
            manager.get(ResourceType::Dashboard, &params).await;
        let _: Option<serde_json::Value> = manager
            .get(ResourceType::Trending, &QueryParams::for_owner("nobody"))
            .await;

        let snapshot = metrics.snapshot().await;
        assert!(snapshot.hit_rate > 0.0);
        assert!(snapshot.miss_rate > 0.0);
        assert!((snapshot.hit_rate + snapshot.miss_rate - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_compression_ratio_reflects_large_entries() {
        let (manager, metrics) = harness();

        // One small (raw) and one large (compressed) entry.
        manager
            .set(
                ResourceType::Dashboard,
                &QueryParams::for_owner("user-1"),
                &json!({"views": 1}),
                CallerRole::Viewer,
            )
            .await;
        manager
            .set(
                ResourceType::Analytics,
                &QueryParams::for_owner("user-2"),
                &json!({ "blob": "x".repeat(10_000) }),
                CallerRole::Viewer,
            )
            .await;

        let snapshot = metrics.snapshot().await;
        assert!((snapshot.compression_ratio - 0.5).abs() < 1e-9);
    }
}
