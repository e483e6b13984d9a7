pub mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::AppState;

pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/{id}", delete(handlers::close_session))
        .route("/api/sessions/{id}/document", put(handlers::render_document))
        .route("/api/sessions/{id}/reload", post(handlers::reload))
        .route("/api/sessions/{id}/status", get(handlers::status))
        .route("/api/sessions/{id}/status/stream", get(handlers::status_stream))
        .route("/api/sessions/{id}/download", get(handlers::download))
}
