//! Integration tests for the cache layer's end-to-end behavior.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use reel_cache::cache::key::{CallerRole, QueryParams, ResourceType};
use reel_cache::cache::manager::CacheManager;
use reel_cache::cache::policy::{PolicyDelta, PolicyStore, Priority};
use reel_cache::config::Config;
use reel_cache::store::memory::MemoryStore;
use reel_cache::store::KeyValueStore;

fn harness(config: Config) -> (Arc<MemoryStore>, Arc<PolicyStore>, CacheManager) {
    let config = Arc::new(config);
    let store = Arc::new(MemoryStore::new());
    let policy = Arc::new(PolicyStore::new(config.clone(), store.clone()));
    let manager = CacheManager::new(config, store.clone(), policy.clone());
    (store, policy, manager)
}

#[tokio::test(start_paused = true)]
async fn test_trending_filmmaker_scenario() {
    // Policy: trending/filmmaker, ttl 600, max 50 000, medium priority.
    let (_, policy, manager) = harness(Config::default());
    policy
        .update_policy(
            ResourceType::Trending,
            Some(CallerRole::Filmmaker),
            PolicyDelta {
                ttl_secs: Some(600),
                max_size_bytes: Some(50_000),
                priority: Some(Priority::Medium),
            },
        )
        .await;

    // A 40 000-byte payload passes admission.
    assert!(
        policy
            .should_cache(ResourceType::Trending, CallerRole::Filmmaker, 40_000)
            .await
    );

    let params = QueryParams::for_owner("global").with_window("24h");
    let value = json!({ "rows": vec!["x".repeat(100); 300] });
    manager
        .set(ResourceType::Trending, &params, &value, CallerRole::Filmmaker)
        .await;

    // Readable within the TTL window.
    let got: Option<serde_json::Value> = manager.get(ResourceType::Trending, &params).await;
    assert_eq!(got, Some(value));

    // Absent after the store-native TTL elapses.
    tokio::time::advance(Duration::from_secs(601)).await;
    let got: Option<serde_json::Value> = manager.get(ResourceType::Trending, &params).await;
    assert!(got.is_none());
}

#[tokio::test]
async fn test_invalidate_by_owner_is_scoped() {
    let (store, _, manager) = harness(Config::default());

    // Seed five entries per owner, per the 5-vs-5 scenario.
    for owner in ["user-42", "user-99"] {
        for i in 0..5 {
            let params = QueryParams::for_owner(owner).with_resource(format!("vid-{i}"));
            manager
                .set(
                    ResourceType::VideoStats,
                    &params,
                    &json!({"views": i}),
                    CallerRole::Filmmaker,
                )
                .await;
        }
    }
    assert_eq!(store.keys("reel:*:user-42:*").await.unwrap().len(), 5);
    assert_eq!(store.keys("reel:*:user-99:*").await.unwrap().len(), 5);

    manager.invalidate_owner("user-42").await;

    assert_eq!(store.keys("reel:*:user-42:*").await.unwrap().len(), 0);
    assert_eq!(store.keys("reel:*:user-99:*").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_invalidate_by_type_is_scoped() {
    let (store, _, manager) = harness(Config::default());

    for i in 0..3 {
        let params = QueryParams::for_owner(format!("user-{i}"));
        manager
            .set(ResourceType::Dashboard, &params, &json!(i), CallerRole::Viewer)
            .await;
        manager
            .set(ResourceType::Analytics, &params, &json!(i), CallerRole::Viewer)
            .await;
    }

    manager.invalidate_type(ResourceType::Dashboard).await;

    assert_eq!(store.keys("reel:dashboard:*").await.unwrap().len(), 0);
    assert_eq!(store.keys("reel:analytics:*").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_compressed_and_raw_entries_roundtrip() {
    let (_, _, manager) = harness(Config::default());

    let small = json!({"views": 3});
    let large = json!({ "rows": vec![json!({"video": "vid", "watch_secs": 120}); 400] });

    let small_params = QueryParams::for_owner("user-1");
    let large_params = QueryParams::for_owner("user-2");

    manager
        .set(ResourceType::Dashboard, &small_params, &small, CallerRole::Viewer)
        .await;
    manager
        .set(ResourceType::Dashboard, &large_params, &large, CallerRole::Viewer)
        .await;

    let got_small: Option<serde_json::Value> =
        manager.get(ResourceType::Dashboard, &small_params).await;
    let got_large: Option<serde_json::Value> =
        manager.get(ResourceType::Dashboard, &large_params).await;
    assert_eq!(got_small, Some(small));
    assert_eq!(got_large, Some(large));
}
