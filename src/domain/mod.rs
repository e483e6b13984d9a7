//! Domain layer types and invariants.

pub mod document;
pub mod error;
pub mod language;
