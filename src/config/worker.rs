//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::WorkerError;

/// Environment variable overriding [`WorkerConfig::parallelism`].
pub const ENV_PARALLELISM: &str = "EOSTRE_PARALLELISM";
/// Environment variable overriding [`WorkerConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "EOSTRE_POLL_INTERVAL_MS";

/// OS signal that triggers a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownSignal {
    /// Ctrl-C / `SIGINT`.
    Interrupt,
    /// `SIGTERM` (Unix only; ignored elsewhere).
    Terminate,
}

/// Configuration for a [`WorkerPool`](crate::core::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of tasks executing at once.
    pub parallelism: usize,
    /// Delay between two queue reads, in milliseconds.
    pub poll_interval_ms: u64,
    /// Signals that start a graceful shutdown.
    pub shutdown_signals: Vec<ShutdownSignal>,
    /// Upper bound on tasks returned by a single read of an
    /// [`InMemoryQueue`](crate::infra::InMemoryQueue) built with `from_config`.
    pub read_batch: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            poll_interval_ms: 5_000,
            shutdown_signals: vec![ShutdownSignal::Interrupt, ShutdownSignal::Terminate],
            read_batch: 32,
        }
    }
}

impl WorkerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with one slot per logical CPU.
    #[must_use]
    pub fn per_cpu() -> Self {
        Self::default().with_parallelism(num_cpus::get())
    }

    /// Set the number of concurrency slots.
    #[must_use]
    pub const fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the poll interval.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Replace the shutdown signal set. An empty set disables signal handling.
    #[must_use]
    pub fn with_shutdown_signals(mut self, signals: impl IntoIterator<Item = ShutdownSignal>) -> Self {
        self.shutdown_signals = signals.into_iter().collect();
        self
    }

    /// Set how many tasks a single in-memory queue read may return.
    #[must_use]
    pub const fn with_read_batch(mut self, read_batch: usize) -> Self {
        self.read_batch = read_batch;
        self
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] for zero or oversized parallelism,
    /// a zero poll interval, or a zero read batch.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.parallelism == 0 {
            return Err(WorkerError::InvalidConfig(
                "parallelism must be greater than 0".into(),
            ));
        }
        if self.parallelism > tokio::sync::Semaphore::MAX_PERMITS
            || u32::try_from(self.parallelism).is_err()
        {
            return Err(WorkerError::InvalidConfig(format!(
                "parallelism {} is too large",
                self.parallelism
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(WorkerError::InvalidConfig(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.read_batch == 0 {
            return Err(WorkerError::InvalidConfig(
                "read_batch must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, WorkerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| WorkerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load overrides from the environment (and a `.env` file if present).
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] if a variable is set but not a
    /// number, or the result does not validate.
    pub fn from_env() -> Result<Self, WorkerError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(parallelism) = read_env(ENV_PARALLELISM)? {
            cfg.parallelism = parallelism;
        }
        if let Some(interval) = read_env(ENV_POLL_INTERVAL_MS)? {
            cfg.poll_interval_ms = interval;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_env<T>(key: &str) -> Result<Option<T>, WorkerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| WorkerError::InvalidConfig(format!("{key}={raw}: {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(WorkerError::InvalidConfig(format!("{key}: {e}"))),
    }
}
