//! Editor languages known to the workspace.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const DEFAULT_DOWNLOAD_STEM: &str = "my-code";

/// Languages the editor offers. Only [`Language::Html`] can be previewed; the
/// others are executed remotely and are out of reach of the preview renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    C,
    Cpp,
    Html,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Html,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Html => "html",
        }
    }

    /// Human readable label shown in the language selector.
    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Html => "HTML/CSS/JS",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Html => "html",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Language::Python => "text/x-python",
            Language::Java => "text/x-java",
            Language::C => "text/x-c",
            Language::Cpp => "text/x-c++",
            Language::Html => "text/html",
        }
    }

    /// Document the editor opens with for this language.
    pub fn starter(self) -> &'static str {
        match self {
            Language::Python => include_str!("starters/main.py"),
            Language::Java => include_str!("starters/Main.java"),
            Language::C => include_str!("starters/main.c"),
            Language::Cpp => include_str!("starters/main.cpp"),
            Language::Html => include_str!("starters/index.html"),
        }
    }

    /// Whether documents in this language carry markup, styles and scripts
    /// that can be rendered in a sandboxed preview.
    pub fn is_markup(self) -> bool {
        matches!(self, Language::Html)
    }

    /// File name used when the user downloads the editor buffer. The language
    /// extension is appended unless the requested name already ends with it.
    pub fn download_file_name(self, requested: &str) -> String {
        let extension = self.extension();
        let trimmed = requested.trim();
        if trimmed.is_empty() {
            return format!("{DEFAULT_DOWNLOAD_STEM}.{extension}");
        }

        let suffix = format!(".{extension}");
        if trimmed.to_ascii_lowercase().ends_with(&suffix) {
            trimmed.to_string()
        } else {
            format!("{trimmed}{suffix}")
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|language| language.as_str() == normalized)
            .ok_or_else(|| DomainError::unknown_language(value))
    }
}
