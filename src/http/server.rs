//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, in-flight tracking)
//! - Report shutdown state through the health endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::CacheBackend;
use crate::config::ListenerConfig;
use crate::http::websocket::ws_handler;
use crate::lifecycle::ShutdownCoordinator;
use crate::net::connection::{track_inflight, InflightTracker};
use crate::realtime::ChannelHub;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: ShutdownCoordinator,
    pub hub: Arc<ChannelHub>,
    pub cache: Arc<dyn CacheBackend>,
}

/// Build the Axum router with all middleware layers.
///
/// Layers run outermost first: request ID, trace, propagate, timeout,
/// in-flight tracking.
#[allow(deprecated)]
pub fn build_router(config: &ListenerConfig, state: AppState, tracker: InflightTracker) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/cache/stats", get(cache_stats))
        .with_state(state)
        .layer(middleware::from_fn_with_state(tracker, track_inflight))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// `200 ok` while running, `503 shutting_down` once shutdown has begun.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.coordinator.is_triggered() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "shutting_down" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}

async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> (Router, ShutdownCoordinator) {
        let coordinator = ShutdownCoordinator::new();
        let state = AppState {
            coordinator: coordinator.clone(),
            hub: Arc::new(ChannelHub::new()),
            cache: Arc::new(MemoryCache::new()),
        };
        let router = build_router(&ListenerConfig::default(), state, InflightTracker::new());
        (router, coordinator)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value, bool) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let has_request_id = response.headers().contains_key("x-request-id");
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap(), has_request_id)
    }

    #[tokio::test]
    async fn health_reports_shutdown() {
        let (router, coordinator) = router();

        let (status, body, has_request_id) = get_json(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(has_request_id);

        coordinator.trigger();
        let (status, body, _) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "shutting_down");
    }

    #[tokio::test]
    async fn cache_stats_start_empty() {
        let (router, _) = router();
        let (status, body, _) = get_json(router, "/api/cache/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"], 0);
        assert_eq!(body["misses"], 0);
    }
}
