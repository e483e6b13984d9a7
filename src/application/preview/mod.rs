//! Live preview of HTML/CSS/JS documents inside a sandboxed surface.
//!
//! A render cycle extracts style and script blocks from the source document,
//! composes a self-contained document around them and mounts it into the
//! renderer's [`SandboxSurface`]. The mounted document reports back through
//! [`PreviewRenderer::notify`].

pub mod compose;
pub mod extract;
pub mod renderer;
pub mod surface;
pub mod types;

pub use compose::compose;
pub use extract::{Extraction, extract};
pub use renderer::PreviewRenderer;
pub use surface::{ComposedDocument, SandboxCapability, SandboxPolicy, SandboxSurface, SurfaceError};
pub use types::{
    EventOutcome, Generation, RenderError, RenderSnapshot, RenderStatus, SandboxEvent,
    UNSUPPORTED_LANGUAGE_MESSAGE,
};
