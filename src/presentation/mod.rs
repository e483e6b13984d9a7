//! Presentation layer: askama templates and view models.

pub mod preview;
pub mod views;
