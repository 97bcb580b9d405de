//! Infrastructure adapters and runtime bootstrap.

pub mod bootstrap;
pub mod error;
pub mod telemetry;
