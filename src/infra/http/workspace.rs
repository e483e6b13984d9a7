use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{error::AppError, preview::SandboxSurface},
    domain::language::Language,
    presentation::views::{
        LanguageOption, StatusView, WorkspaceTemplate, WorkspaceView, render_template_response,
    },
};

use super::AppState;

/// Open a fresh session and send the browser to its workspace.
pub async fn index(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let (id, _) = state.sessions.create()?;
    info!(target = "infra::http::workspace", session = %id, "Workspace opened");
    Ok(Redirect::to(&format!("/sessions/{id}")))
}

pub async fn workspace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let renderer = state.sessions.get(&id).ok_or(AppError::SessionNotFound)?;
    let snapshot = renderer.snapshot();
    let (language, source) = match renderer.last_document() {
        Some(document) => (document.language(), document.text().to_string()),
        None => (Language::Html, Language::Html.starter().to_string()),
    };

    let surface = renderer.surface();
    let view = WorkspaceView {
        preview_url: surface.document_url(),
        sandbox: surface.policy().attribute(),
        api_base: format!("/api/sessions/{id}"),
        generation: snapshot.generation.get(),
        status: StatusView::from(&snapshot),
        languages: LanguageOption::catalog(language),
        source,
    };

    Ok(render_template_response(
        WorkspaceTemplate { view },
        StatusCode::OK,
    ))
}

pub async fn health() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
