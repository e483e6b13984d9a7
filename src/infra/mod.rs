//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod sandbox;
pub mod telemetry;
