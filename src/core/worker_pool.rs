//! Worker pool: poll the queue, admit tasks through N concurrency slots, drain on shutdown.
//!
//! A running pool is two activities plus one short-lived activity per admitted task:
//!
//! - the **poll loop** reads the queue on a fixed interval and pushes each task
//!   onto a single-slot intake channel, so a slow dispatcher back-pressures polling;
//! - the **dispatch loop** pulls from the intake, waits for a free slot, and spawns
//!   the task body, which looks the handler up, invokes it, and releases the slot
//!   on every exit path.
//!
//! Every poll error and task error goes to the error stream; none of them stop
//! the pool. Only the shutdown token does.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eostre_worker::config::WorkerConfig;
//! use eostre_worker::core::{Context, HandlerRegistry, WorkerPool};
//! use eostre_worker::infra::InMemoryQueue;
//!
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register("add", |_cx: Context, a: isize, b: isize| async move {
//!     println!("{}", a + b);
//!     Ok::<(), std::io::Error>(())
//! })?;
//!
//! let pool = WorkerPool::new(WorkerConfig::new().with_parallelism(4), queue, registry)?;
//! let _signals = pool.listen_for_signals();
//! pool.start().await?;
//! ```

mod pool;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

pub use pool::WorkerPool;

/// Lifecycle of a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Constructed, not started.
    Idle,
    /// Polling and dispatching.
    Running,
    /// Shutdown requested; waiting for admitted tasks.
    Draining,
    /// Every admitted task finished.
    Stopped,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Number of concurrency slots.
    pub parallelism: usize,
    /// Tasks currently holding a slot.
    pub active_tasks: u64,
    /// Tasks that acquired a slot.
    pub admitted_tasks: u64,
    /// Tasks whose handler returned success.
    pub completed_tasks: u64,
    /// Tasks that failed: missing handler, invocation error, or recovered panic.
    pub failed_tasks: u64,
    /// Queue reads that returned an error.
    pub poll_errors: u64,
    /// Lifecycle state.
    pub state: PoolState,
}

/// Lock-free counters behind [`WorkerStats`].
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub admitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub poll_errors: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, parallelism: usize, state: PoolState) -> WorkerStats {
        WorkerStats {
            parallelism,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            admitted_tasks: self.admitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            state,
        }
    }
}

/// A held concurrency slot.
///
/// Decrements the active count, then returns the permit to the semaphore.
pub(crate) struct SlotGuard {
    counters: Arc<PoolCounters>,
    _permit: OwnedSemaphorePermit,
}

impl SlotGuard {
    pub fn new(counters: Arc<PoolCounters>, permit: OwnedSemaphorePermit) -> Self {
        counters.admitted_tasks.fetch_add(1, Ordering::Relaxed);
        counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        Self {
            counters,
            _permit: permit,
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Cloneable trigger for a pool's graceful shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stop polling and admission. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once shutdown is requested.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Semaphore;

    #[test]
    fn test_pool_state_display() {
        assert_eq!(PoolState::Draining.to_string(), "draining");
        assert_eq!(
            serde_json::to_string(&PoolState::Stopped).unwrap(),
            "\"stopped\""
        );
    }

    #[test]
    fn test_pool_counters_snapshot() {
        let counters = PoolCounters::default();
        counters.completed_tasks.fetch_add(5, Ordering::Relaxed);
        counters.poll_errors.fetch_add(2, Ordering::Relaxed);

        let stats = counters.snapshot(4, PoolState::Running);
        assert_eq!(stats.parallelism, 4);
        assert_eq!(stats.completed_tasks, 5);
        assert_eq!(stats.poll_errors, 2);
        assert_eq!(stats.state, PoolState::Running);
    }

    #[test]
    fn test_slot_guard_releases_on_drop() {
        let slots = Arc::new(Semaphore::new(1));
        let counters = Arc::new(PoolCounters::default());
        let permit = Arc::clone(&slots).try_acquire_owned().unwrap();
        let guard = SlotGuard::new(Arc::clone(&counters), permit);
        assert_eq!(slots.available_permits(), 0);
        assert_eq!(counters.active_tasks.load(Ordering::Relaxed), 1);

        drop(guard);
        assert_eq!(slots.available_permits(), 1);
        assert_eq!(counters.active_tasks.load(Ordering::Relaxed), 0);
        assert_eq!(counters.admitted_tasks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_shutdown_handle_is_shared() {
        let token = CancellationToken::new();
        let handle = ShutdownHandle::new(token.clone());
        let other = handle.clone();
        other.shutdown();
        assert!(handle.is_shutdown());
        assert!(token.is_cancelled());
    }
}
