//! Configuration models for the worker pool.

pub mod worker;

pub use worker::{ShutdownSignal, WorkerConfig, ENV_PARALLELISM, ENV_POLL_INTERVAL_MS};
