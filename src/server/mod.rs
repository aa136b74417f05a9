//! Operator-facing HTTP surface.
//!
//! Thin pass-throughs over the cache manager, policy store, and metrics
//! collector:
//! - GET  /health
//! - GET  /cache/metrics
//! - GET  /cache/policies
//! - POST /cache/policies    (partial policy update)
//! - POST /cache/invalidate  (by type or by owner)
//!
//! Authorization is performed upstream by the platform's auth layer; this
//! surface performs none.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::key::{CallerRole, ResourceType};
use crate::cache::manager::CacheManager;
use crate::cache::metrics::MetricsCollector;
use crate::cache::policy::{PolicyDelta, PolicyStore};

/// Application state shared across handlers.
pub struct AppState {
    pub manager: Arc<CacheManager>,
    pub policy: Arc<PolicyStore>,
    pub metrics: Arc<MetricsCollector>,
    pub start_time: Instant,
}

/// Build the axum router with all operator routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cache/metrics", get(cache_metrics))
        .route("/cache/policies", get(list_policies).post(update_policy))
        .route("/cache/invalidate", post(invalidate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn cache_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot().await)
}

async fn list_policies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.policy.policies().await)
}

/// Partial policy update request.
#[derive(Debug, Deserialize)]
struct UpdatePolicyRequest {
    resource_type: ResourceType,
    role: Option<CallerRole>,
    ttl_secs: Option<u64>,
    max_size_bytes: Option<u64>,
    priority: Option<crate::cache::policy::Priority>,
}

async fn update_policy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePolicyRequest>,
) -> impl IntoResponse {
    state
        .policy
        .update_policy(
            req.resource_type,
            req.role,
            PolicyDelta {
                ttl_secs: req.ttl_secs,
                max_size_bytes: req.max_size_bytes,
                priority: req.priority,
            },
        )
        .await;
    StatusCode::NO_CONTENT
}

/// Invalidation request: exactly one of `resource_type` or `owner_id`.
#[derive(Debug, Deserialize)]
struct InvalidateRequest {
    resource_type: Option<ResourceType>,
    owner_id: Option<String>,
}

async fn invalidate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvalidateRequest>,
) -> impl IntoResponse {
    match (req.resource_type, req.owner_id) {
        (Some(resource_type), None) => {
            info!(%resource_type, "Operator invalidation by type");
            state.manager.invalidate_type(resource_type).await;
            StatusCode::NO_CONTENT
        }
        (None, Some(owner_id)) => {
            info!(owner_id = %owner_id, "Operator invalidation by owner");
            state.manager.invalidate_owner(&owner_id).await;
            StatusCode::NO_CONTENT
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::QueryParams;
    use crate::config::Config;
    use crate::store::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> (Arc<CacheManager>, Router) {
        let config = Arc::new(Config::default());
        let store = Arc::new(MemoryStore::new());
        let policy = Arc::new(PolicyStore::new(config.clone(), store.clone()));
        let manager = Arc::new(CacheManager::new(config.clone(), store.clone(), policy.clone()));
        let metrics = Arc::new(MetricsCollector::new(config, store));
        let state = Arc::new(AppState {
            manager: manager.clone(),
            policy,
            metrics,
            start_time: Instant::now(),
        });
        (manager, build_router(state))
    }

    #[tokio::test]
    async fn test_health_responds() {
        let (_, router) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalidate_by_owner_route() {
        let (manager, router) = app();
        let params = QueryParams::for_owner("user-42");
        manager
            .set(ResourceType::Dashboard, &params, &json!(1), CallerRole::Viewer)
            .await;

        let request = Request::post("/cache/invalidate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"owner_id": "user-42"}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let got: Option<serde_json::Value> =
            manager.get(ResourceType::Dashboard, &params).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_requires_exactly_one_scope() {
        let (_, router) = app();
        let request = Request::post("/cache/invalidate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"resource_type": "trending", "owner_id": "user-1"}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
