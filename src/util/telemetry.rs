//! Telemetry helpers for structured logging and tracing.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::core::WorkerError;

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs a default env-based subscriber if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Drain a pool's error stream into `warn!` records.
///
/// Returns the number of errors seen once every sender is gone.
pub async fn log_errors(mut errors: UnboundedReceiver<WorkerError>) -> u64 {
    let mut seen = 0;
    while let Some(err) = errors.recv().await {
        seen += 1;
        match &err {
            WorkerError::QueueRead(source) => warn!(error = %source, "queue read failed"),
            WorkerError::HandlerNotFound(signature) => {
                warn!(signature = %signature, "no handler registered");
            }
            WorkerError::Invoke { signature, source } => {
                warn!(signature = %signature, error = %source, "task failed");
            }
            other => warn!(error = %other, "worker error"),
        }
    }
    seen
}
