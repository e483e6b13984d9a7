use std::fmt;

use codeverse_api_types::{RenderSnapshotPayload, RenderStatusPayload, SandboxEventKind};
use thiserror::Error;

use crate::domain::language::Language;

use super::surface::SurfaceError;

/// Fixed status message for inputs the renderer refuses to preview.
pub const UNSUPPORTED_LANGUAGE_MESSAGE: &str = "Preview only available for HTML/CSS/JS projects";

/// Sequence number of one render cycle. Events tagged with an older
/// generation belong to a superseded cycle and are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outer status of the preview as observed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
    /// No render has been requested yet.
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// Events reported back by a sandboxed preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    /// The composed trailing script finished, whether or not user code threw.
    Ready,
    /// The hosting frame observed its native load event.
    Loaded,
    /// User code threw, or an uncaught error reached the global handler.
    RuntimeError(String),
}

impl SandboxEvent {
    pub fn from_wire(kind: SandboxEventKind, message: Option<String>) -> Self {
        match kind {
            SandboxEventKind::Ready => SandboxEvent::Ready,
            SandboxEventKind::Loaded => SandboxEvent::Loaded,
            SandboxEventKind::RuntimeError => SandboxEvent::RuntimeError(
                message.unwrap_or_else(|| "Unknown script error".to_string()),
            ),
        }
    }
}

/// What happened to an event handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// The event belongs to a superseded render cycle.
    Stale,
    /// The event arrived after the cycle already reached its terminal state.
    Ignored,
}

/// Read model of the current render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSnapshot {
    pub generation: Generation,
    pub status: RenderStatus,
    /// Inline banner text of the first runtime fault of this cycle.
    pub runtime_error: Option<String>,
    /// Runtime faults observed after the first one.
    pub suppressed_faults: u32,
}

impl RenderSnapshot {
    pub(crate) fn idle() -> Self {
        Self {
            generation: Generation::default(),
            status: RenderStatus::Idle,
            runtime_error: None,
            suppressed_faults: 0,
        }
    }

    pub(crate) fn begin(generation: Generation, status: RenderStatus) -> Self {
        Self {
            generation,
            status,
            runtime_error: None,
            suppressed_faults: 0,
        }
    }
}

impl From<&RenderStatus> for RenderStatusPayload {
    fn from(status: &RenderStatus) -> Self {
        match status {
            RenderStatus::Idle => RenderStatusPayload::Idle,
            RenderStatus::Loading => RenderStatusPayload::Loading,
            RenderStatus::Ready => RenderStatusPayload::Ready,
            RenderStatus::Error(message) => RenderStatusPayload::Error {
                message: message.clone(),
            },
        }
    }
}

impl From<&RenderSnapshot> for RenderSnapshotPayload {
    fn from(snapshot: &RenderSnapshot) -> Self {
        Self {
            generation: snapshot.generation.get(),
            status: RenderStatusPayload::from(&snapshot.status),
            runtime_error: snapshot.runtime_error.clone(),
            suppressed_faults: snapshot.suppressed_faults,
        }
    }
}

/// Renderer-fatal failures. Failures inside a render cycle end it in
/// [`RenderStatus::Error`]; user script faults never produce one of these.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("{}", UNSUPPORTED_LANGUAGE_MESSAGE)]
    UnsupportedLanguage { language: Language },
    #[error("preview composition failed: {message}")]
    Composition { message: String },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("nothing to reload: no document has been rendered yet")]
    NothingToReload,
}

impl RenderError {
    pub fn composition(message: impl Into<String>) -> Self {
        Self::Composition {
            message: message.into(),
        }
    }
}
