//! The sandboxed execution context a renderer writes composed documents into.

use std::sync::Arc;

use thiserror::Error;

use super::types::Generation;

/// Browser sandbox capabilities a preview may be granted. Anything that is
/// not listed here (top navigation, downloads, pointer lock, ...) cannot be
/// expressed and is therefore never granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxCapability {
    Scripts,
    SameOrigin,
    Forms,
    Modals,
    Popups,
}

impl SandboxCapability {
    pub fn token(self) -> &'static str {
        match self {
            SandboxCapability::Scripts => "allow-scripts",
            SandboxCapability::SameOrigin => "allow-same-origin",
            SandboxCapability::Forms => "allow-forms",
            SandboxCapability::Modals => "allow-modals",
            SandboxCapability::Popups => "allow-popups",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    capabilities: Vec<SandboxCapability>,
}

impl SandboxPolicy {
    pub fn new(capabilities: impl IntoIterator<Item = SandboxCapability>) -> Self {
        let mut unique = Vec::new();
        for capability in capabilities {
            if !unique.contains(&capability) {
                unique.push(capability);
            }
        }
        Self {
            capabilities: unique,
        }
    }

    /// Capabilities granted to live previews. Scripts run with the frame's
    /// own origin so they can reach the bridge, and interactive demos may
    /// submit forms and open dialogs or popups. Same-origin access is only
    /// safe while previews are served from an origin other than the host
    /// page's.
    pub fn preview() -> Self {
        Self::new([
            SandboxCapability::Scripts,
            SandboxCapability::SameOrigin,
            SandboxCapability::Forms,
            SandboxCapability::Modals,
            SandboxCapability::Popups,
        ])
    }

    pub fn allows(&self, capability: SandboxCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Value for an `<iframe sandbox="...">` attribute.
    pub fn attribute(&self) -> String {
        self.capabilities
            .iter()
            .map(|capability| capability.token())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `Content-Security-Policy` directive enforcing the same sandbox on the
    /// document itself, independent of how it is embedded.
    pub fn csp_directive(&self) -> String {
        let attribute = self.attribute();
        if attribute.is_empty() {
            "sandbox".to_string()
        } else {
            format!("sandbox {attribute}")
        }
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::preview()
    }
}

/// A fully composed, self-contained preview document for one render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    generation: Generation,
    html: Arc<str>,
}

impl ComposedDocument {
    pub fn new(generation: Generation, html: impl Into<Arc<str>>) -> Self {
        Self {
            generation,
            html: html.into(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    #[error("preview surface unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("preview surface rejected the document: {reason}")]
    Rejected { reason: String },
}

impl SurfaceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// The single execution-context slot owned by a renderer. Mounting replaces
/// whatever the slot held before; nothing from a previous document survives.
pub trait SandboxSurface: Send + Sync {
    fn policy(&self) -> &SandboxPolicy;

    fn mount(&self, document: ComposedDocument) -> Result<(), SurfaceError>;

    /// Endpoint a mounted document posts its sandbox events to, when the
    /// surface provides a bridge back to the renderer.
    fn bridge_endpoint(&self) -> Option<String> {
        None
    }
}

impl<S: SandboxSurface + ?Sized> SandboxSurface for Arc<S> {
    fn policy(&self) -> &SandboxPolicy {
        (**self).policy()
    }

    fn mount(&self, document: ComposedDocument) -> Result<(), SurfaceError> {
        (**self).mount(document)
    }

    fn bridge_endpoint(&self) -> Option<String> {
        (**self).bridge_endpoint()
    }
}
