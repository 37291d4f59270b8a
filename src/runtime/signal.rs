//! OS signal shutdown trigger.

use std::future::pending;

use tracing::{info, warn};

use crate::config::ShutdownSignal;

/// Resolve when any signal in `signals` is delivered.
///
/// With an empty set this never resolves. `Terminate` is only observed on
/// Unix. A signal whose handler can not be installed is logged and skipped.
pub async fn wait_for_signal(signals: &[ShutdownSignal]) -> ShutdownSignal {
    let interrupt = signals.contains(&ShutdownSignal::Interrupt);
    let terminate = signals.contains(&ShutdownSignal::Terminate);

    tokio::select! {
        () = wait_interrupt(interrupt) => {
            info!(signal = "interrupt", "shutdown signal received");
            ShutdownSignal::Interrupt
        }
        () = wait_terminate(terminate) => {
            info!(signal = "terminate", "shutdown signal received");
            ShutdownSignal::Terminate
        }
    }
}

async fn wait_interrupt(enabled: bool) {
    if !enabled {
        return pending().await;
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for interrupt");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_terminate(enabled: bool) {
    use tokio::signal::unix::{signal, SignalKind};

    if !enabled {
        return pending().await;
    }
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            if stream.recv().await.is_none() {
                pending::<()>().await;
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to listen for terminate");
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_terminate(_enabled: bool) {
    pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_set_never_resolves() {
        let waited = tokio::time::timeout(Duration::from_millis(20), wait_for_signal(&[])).await;
        assert!(waited.is_err());
    }
}
