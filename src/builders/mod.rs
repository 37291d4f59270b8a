//! Builders to construct worker pools from configuration.

pub mod worker_builder;

pub use worker_builder::WorkerBuilder;
