use std::sync::Arc;

use super::language::Language;

/// A complete document as authored in the editor. Opaque to everything but
/// the preview extraction step; replaced wholesale on every edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    language: Language,
    text: Arc<str>,
}

impl SourceDocument {
    pub fn new(language: Language, text: impl Into<Arc<str>>) -> Self {
        Self {
            language,
            text: text.into(),
        }
    }

    pub fn html(text: impl Into<Arc<str>>) -> Self {
        Self::new(Language::Html, text)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
