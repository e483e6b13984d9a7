//! HTTP surface of the preview service.

pub mod api;
mod middleware;
mod preview;
mod workspace;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::sandbox::PreviewSessions;

#[derive(Clone)]
pub struct AppState {
    pub sessions: PreviewSessions,
}

impl AppState {
    pub fn new(sessions: PreviewSessions) -> Self {
        Self { sessions }
    }
}

/// Workspace pages and the JSON API. Preview documents are not served here.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(workspace::index))
        .route("/sessions/{id}", get(workspace::workspace))
        .route("/_health", get(workspace::health))
        .merge(api::build_api_router())
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

/// Routes served on the preview origin: mounted documents and the bridge
/// their runtime reports through. Nothing else is reachable from a frame.
pub fn build_preview_router(state: AppState) -> Router {
    Router::new()
        .route("/preview/{id}", get(preview::serve_document))
        .route("/preview/{id}/events", post(preview::receive_event))
        .route("/_health", get(workspace::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
