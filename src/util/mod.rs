//! Shared utilities.

pub mod telemetry;

pub use telemetry::{init_tracing, log_errors};
