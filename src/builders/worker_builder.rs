//! Builder to assemble a worker pool from configuration.

use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::core::{HandlerRegistry, TaskQueue, WorkerError, WorkerPool};

/// Assemble a [`WorkerPool`].
///
/// A queue is required. The registry defaults to an empty one.
#[derive(Default)]
pub struct WorkerBuilder {
    config: WorkerConfig,
    queue: Option<Arc<dyn TaskQueue>>,
    registry: Option<Arc<HandlerRegistry>>,
}

impl WorkerBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the environment (see [`WorkerConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] if the environment is malformed.
    pub fn from_env() -> Result<Self, WorkerError> {
        Ok(Self::new().config(WorkerConfig::from_env()?))
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of concurrency slots.
    #[must_use]
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    /// Queue to poll.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Registry to dispatch against.
    #[must_use]
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the configuration and build an idle pool.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] if no queue was set or the
    /// configuration is invalid.
    pub fn build(self) -> Result<WorkerPool, WorkerError> {
        let queue = self
            .queue
            .ok_or_else(|| WorkerError::InvalidConfig("queue not set".into()))?;
        let registry = self.registry.unwrap_or_default();
        WorkerPool::new(self.config, queue, registry)
    }
}
