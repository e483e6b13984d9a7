//! JSON handlers driving a session's renderer.

use std::{convert::Infallible, str::FromStr, sync::Arc};

use async_stream::stream;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use codeverse_api_types::{
    RenderAccepted, RenderDocumentRequest, RenderSnapshotPayload, RenderStatusPayload,
    SessionCreated,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::preview::Generation,
    domain::{document::SourceDocument, language::Language},
    infra::{http::AppState, sandbox::SessionRenderer},
};

use super::error::ApiError;

const SOURCE: &str = "infra::http::api";

fn session(state: &AppState, id: Uuid) -> Result<Arc<SessionRenderer>, ApiError> {
    state
        .sessions
        .get(&id)
        .ok_or_else(ApiError::session_not_found)
}

fn accepted(renderer: &SessionRenderer, generation: Generation) -> Response {
    let snapshot = renderer.snapshot();
    let body = RenderAccepted {
        generation: generation.get(),
        status: RenderStatusPayload::from(&snapshot.status),
    };
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

pub async fn create_session(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (id, _) = state.sessions.create()?;
    let body = SessionCreated {
        id,
        workspace_url: format!("/sessions/{id}"),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sessions
        .remove(&id)
        .ok_or_else(ApiError::session_not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn render_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RenderDocumentRequest>,
) -> Result<Response, ApiError> {
    let renderer = session(&state, id)?;
    let language = Language::from_str(&request.language)?;

    let generation = renderer.render(SourceDocument::new(language, request.source));
    info!(
        target = SOURCE,
        session = %id,
        generation = generation.get(),
        language = %language,
        "Render requested"
    );
    Ok(accepted(&renderer, generation))
}

pub async fn reload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let renderer = session(&state, id)?;
    let generation = renderer.reload()?;
    Ok(accepted(&renderer, generation))
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let renderer = session(&state, id)?;
    Ok(Json(RenderSnapshotPayload::from(&renderer.snapshot())))
}

/// Stream every snapshot change as a `snapshot` event, starting with the
/// current one. The stream ends when the session is dropped.
pub async fn status_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut updates = session(&state, id)?.subscribe();

    let events = stream! {
        loop {
            let payload = RenderSnapshotPayload::from(&*updates.borrow_and_update());
            match Event::default().event("snapshot").json_data(&payload) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        session = %id,
                        error = %err,
                        "Failed to encode snapshot event"
                    );
                    break;
                }
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DownloadQuery {
    name: Option<String>,
}

/// The last submitted document as a file named after its language.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let document = session(&state, id)?.last_document().ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            super::error::codes::NOTHING_TO_DOWNLOAD,
            "nothing to download",
            None,
        )
    })?;

    let language = document.language();
    let file_name = language.download_file_name(query.name.as_deref().unwrap_or_default());
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file_name.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut response = document.text().to_string().into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(language.mime_type()));
    headers.insert(CONTENT_DISPOSITION, disposition);
    Ok(response)
}
