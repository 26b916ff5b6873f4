//! Router assembly: the `/api/v1` endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - health, paper generation and test persistence under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/paper/generate", post(http::http_post_generate))
        .route("/api/v1/test/save", post(http::http_post_save))
        .route("/api/v1/test/drafts/:group_code/:teacher_id", get(http::http_get_drafts))
        .route("/api/v1/test/paper/:group_code/:test_id", get(http::http_get_paper))
        .route("/api/v1/test/templates/:group_code/:teacher_id", get(http::http_get_templates))
        .route("/api/v1/test/template/:group_code/:template_id", get(http::http_get_template))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
