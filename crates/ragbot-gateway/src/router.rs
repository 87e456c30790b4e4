use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{chat_handler, health_handler, index_handler};
use super::server::AppState;
use ragbot_core::service::QaService;

/// Routes: `GET /` chat page, `GET|POST /get` question, `GET /health`.
pub fn build_router(qa: Arc<dyn QaService>, max_body_size: usize) -> Router {
    let state = AppState {
        qa,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/", get(index_handler))
        .route("/get", get(chat_handler).post(chat_handler))
        .route("/health", get(health_handler))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
