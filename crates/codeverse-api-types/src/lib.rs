//! Wire types shared by the CodeVerse preview service, the workspace page and
//! the sandboxed preview documents that report back to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response body for `POST /api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: Uuid,
    /// Workspace page hosting the sandboxed preview frame.
    pub workspace_url: String,
}

/// Request body for `PUT /api/sessions/{id}/document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDocumentRequest {
    /// Editor language identifier (`html`, `python`, ...).
    pub language: String,
    /// Complete source document as authored by the user.
    pub source: String,
}

/// Outer render status as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenderStatusPayload {
    Idle,
    Loading,
    Ready,
    Error { message: String },
}

/// Response body for render and reload requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderAccepted {
    pub generation: u64,
    pub status: RenderStatusPayload,
}

/// Read model served by the status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSnapshotPayload {
    pub generation: u64,
    pub status: RenderStatusPayload,
    /// Banner text of the first runtime fault captured inside the sandbox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<String>,
    /// Runtime faults seen after the first one in the same cycle.
    #[serde(default)]
    pub suppressed_faults: u32,
}

/// Event kinds a sandboxed preview may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxEventKind {
    /// The composed script finished executing.
    Ready,
    /// The frame fired its native load event.
    Loaded,
    /// A user script threw or an uncaught error reached the global handler.
    RuntimeError,
}

/// Request body for `POST /preview/{id}/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxEventPayload {
    pub generation: u64,
    pub kind: SandboxEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error envelope returned by the JSON API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    /// Stable machine-readable code, e.g. `not_found`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_payload_is_internally_tagged() {
        let value = serde_json::to_value(RenderStatusPayload::Error {
            message: "boom".to_string(),
        })
        .expect("serialize status");
        assert_eq!(
            value,
            serde_json::json!({ "state": "error", "message": "boom" })
        );

        let ready: RenderStatusPayload =
            serde_json::from_value(serde_json::json!({ "state": "ready" }))
                .expect("deserialize status");
        assert_eq!(ready, RenderStatusPayload::Ready);
    }

    #[test]
    fn sandbox_event_message_is_optional() {
        let event: SandboxEventPayload = serde_json::from_str(r#"{"generation":3,"kind":"loaded"}"#)
            .expect("deserialize event");
        assert_eq!(event.generation, 3);
        assert_eq!(event.kind, SandboxEventKind::Loaded);
        assert!(event.message.is_none());

        let event: SandboxEventPayload = serde_json::from_str(
            r#"{"generation":4,"kind":"runtime_error","message":"Error: boom"}"#,
        )
        .expect("deserialize event");
        assert_eq!(event.kind, SandboxEventKind::RuntimeError);
        assert_eq!(event.message.as_deref(), Some("Error: boom"));
    }
}
