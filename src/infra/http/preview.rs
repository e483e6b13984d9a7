//! Routes the sandboxed preview frame talks to: the mounted document itself
//! and the bridge its runtime script reports events through.

use axum::{
    Json,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    response::{IntoResponse, Response},
};
use codeverse_api_types::SandboxEventPayload;
use tracing::debug;
use uuid::Uuid;

use crate::application::{
    error::HttpError,
    preview::{EventOutcome, Generation, SandboxEvent, SandboxSurface},
};

use super::AppState;

const SOURCE: &str = "infra::http::preview";

/// Serve the document currently mounted in a session's surface. The response
/// carries the sandbox policy as a CSP directive so the document stays
/// confined even when opened outside the workspace frame.
pub async fn serve_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpError> {
    let renderer = state.sessions.get(&id).ok_or_else(|| {
        HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Preview session not found",
            format!("no session {id}"),
        )
    })?;

    let surface = renderer.surface();
    let document = surface.current().ok_or_else(|| {
        HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Nothing to preview yet",
            format!("session {id} has no mounted document"),
        )
    })?;

    let csp = surface.policy().csp_directive();
    let mut response = document.html().to_string().into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    if let Ok(value) = HeaderValue::from_str(&csp) {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }
    Ok(response)
}

/// Sandbox bridge. Every event is acknowledged with `204`; stale and late
/// events are dropped by the renderer.
pub async fn receive_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SandboxEventPayload>,
) -> Result<StatusCode, HttpError> {
    let renderer = state.sessions.get(&id).ok_or_else(|| {
        HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Preview session not found",
            format!("event for unknown session {id}"),
        )
    })?;

    let generation = Generation::new(payload.generation);
    let event = SandboxEvent::from_wire(payload.kind, payload.message);
    let outcome = renderer.notify(generation, event);
    if outcome != EventOutcome::Applied {
        debug!(
            target = SOURCE,
            session = %id,
            generation = generation.get(),
            kind = ?payload.kind,
            outcome = ?outcome,
            "Sandbox event not applied"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
