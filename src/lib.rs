//! CodeVerse live preview: renders HTML/CSS/JS documents inside a sandboxed
//! frame and reports their status back to the editor.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
mod util;
