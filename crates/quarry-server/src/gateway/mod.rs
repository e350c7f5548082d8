//! HTTP gateway (Axum) for the question-answering pipeline.
//!
//! This module is primarily used by the `quarry` server binary.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;
pub mod streaming;

#[cfg(test)]
mod handler_tests;

use axum::{
    extract::State,
    http::{header::HeaderValue, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handler::query_handler;
pub use payload::{QueryRequest, QueryResponse, ResponseMetadata, TokenUsage};
pub use state::HandlerState;
pub use streaming::query_stream_handler;

/// Response header carrying the gateway's cache/pipeline status.
pub const QUARRY_STATUS_HEADER: &str = "x-quarry-status";
pub const QUARRY_STATUS_HIT: &str = "hit";
pub const QUARRY_STATUS_MISS: &str = "miss";
pub const QUARRY_STATUS_HEALTHY: &str = "healthy";
pub const QUARRY_STATUS_READY: &str = "ready";
pub const QUARRY_STATUS_ERROR: &str = "error";

pub fn create_router_with_state(state: HandlerState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/", get(root_handler))
        .route("/query", post(query_handler))
        .route("/query/stream", post(query_stream_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub corpus: &'static str,
    pub embedder_mode: &'static str,
    pub reranker_mode: &'static str,
}

#[derive(serde::Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub cache_stats: quarry::CacheStats,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        QUARRY_STATUS_HEADER,
        HeaderValue::from_static(QUARRY_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let corpus_status = if state.passages.is_empty() {
        // An empty corpus still serves; every query just reports no_context.
        "empty"
    } else {
        QUARRY_STATUS_READY
    };

    let components = ComponentStatus {
        http: QUARRY_STATUS_READY,
        corpus: corpus_status,
        embedder_mode: if state.embedder_stub { "stub" } else { "real" },
        reranker_mode: if state.reranker_stub { "stub" } else { "real" },
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        QUARRY_STATUS_HEADER,
        HeaderValue::from_static(QUARRY_STATUS_READY),
    );

    (
        StatusCode::OK,
        headers,
        Json(ReadyResponse {
            status: "ok",
            components,
        }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn root_handler(State(state): State<HandlerState>) -> Response {
    Json(RootResponse {
        message: "Quarry retrieval API is running",
        cache_stats: state.cache.stats(),
    })
    .into_response()
}
