//! Tokio implementation of the worker pool.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::core::{invoke, Context, HandlerRegistry, Task, TaskQueue, WorkerError};
use crate::runtime::signal::wait_for_signal;

use super::{PoolCounters, PoolState, ShutdownHandle, SlotGuard, WorkerStats};

/// State shared with every spawned task body.
struct Shared {
    worker_id: Uuid,
    registry: Arc<HandlerRegistry>,
    counters: Arc<PoolCounters>,
    errors: mpsc::UnboundedSender<WorkerError>,
}

impl Shared {
    /// Look up and invoke the handler for `task`.
    async fn execute(&self, task: &Task) -> Result<(), WorkerError> {
        let operand = self
            .registry
            .lookup(&task.signature)
            .ok_or_else(|| WorkerError::HandlerNotFound(task.signature.clone()))?;

        invoke(&operand, task)
            .await
            .map_err(|source| WorkerError::Invoke {
                signature: task.signature.clone(),
                source,
            })
    }

    /// Task body run under a held slot; the guard is released when this returns.
    async fn run_admitted(self: Arc<Self>, task: Task, _slot: SlotGuard) {
        debug!(worker_id = %self.worker_id, signature = %task.signature, "task started");
        match self.execute(&task).await {
            Ok(()) => {
                self.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id = %self.worker_id, signature = %task.signature, "task finished");
            }
            Err(err) => {
                self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker_id = %self.worker_id,
                    signature = %task.signature,
                    error = %err,
                    "task failed"
                );
                // A dropped receiver means nobody is listening; the failure is already logged.
                let _ = self.errors.send(err);
            }
        }
    }
}

/// Bounded-concurrency worker pool fed by a [`TaskQueue`].
///
/// `parallelism` is the hard cap on tasks executing at once; it is enforced by a
/// counting semaphore whose permits travel with each spawned task body.
pub struct WorkerPool {
    config: WorkerConfig,
    permits: u32,
    queue: Arc<dyn TaskQueue>,
    shared: Arc<Shared>,
    slots: Arc<Semaphore>,
    state: Mutex<PoolState>,
    error_rx: Mutex<Option<mpsc::UnboundedReceiver<WorkerError>>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Create an idle pool.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] if the configuration is invalid.
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn TaskQueue>,
        registry: Arc<HandlerRegistry>,
    ) -> Result<Self, WorkerError> {
        config.validate()?;
        let permits = u32::try_from(config.parallelism)
            .map_err(|e| WorkerError::InvalidConfig(format!("parallelism: {e}")))?;

        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            worker_id: Uuid::new_v4(),
            registry,
            counters: Arc::new(PoolCounters::default()),
            errors: error_tx,
        });

        debug!(
            worker_id = %shared.worker_id,
            parallelism = config.parallelism,
            poll_interval_ms = config.poll_interval_ms,
            "worker pool created"
        );

        Ok(Self {
            slots: Arc::new(Semaphore::new(config.parallelism)),
            config,
            permits,
            queue,
            shared,
            state: Mutex::new(PoolState::Idle),
            error_rx: Mutex::new(Some(error_rx)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Identifier used in this pool's log records.
    #[must_use]
    pub fn worker_id(&self) -> Uuid {
        self.shared.worker_id
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Take the receiving end of the error stream.
    ///
    /// Returns `None` after the first call. Errors sent while nobody holds the
    /// receiver accumulate in memory, so a long-running pool should have a consumer
    /// (see [`log_errors`](crate::util::telemetry::log_errors)).
    pub fn take_error_stream(&self) -> Option<mpsc::UnboundedReceiver<WorkerError>> {
        self.error_rx.lock().take()
    }

    /// Handle that can stop this pool from anywhere.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shutdown.clone())
    }

    /// Request a graceful shutdown. [`start`](Self::start) returns once every
    /// admitted task finished.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Spawn a listener that shuts the pool down on any configured OS signal.
    ///
    /// The listener exits on its own once the pool shuts down for another reason.
    #[must_use = "dropping the handle detaches the listener; abort it to stop listening"]
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let signals = self.config.shutdown_signals.clone();
        let shutdown = self.shutdown.clone();
        let worker_id = self.shared.worker_id;
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                signal = wait_for_signal(&signals) => {
                    info!(worker_id = %worker_id, ?signal, "shutting down on signal");
                    shutdown.cancel();
                }
            }
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// Snapshot of pool counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.shared
            .counters
            .snapshot(self.config.parallelism, self.state())
    }

    /// Run a single task body directly, bypassing the queue and the slots.
    ///
    /// # Errors
    ///
    /// [`WorkerError::HandlerNotFound`] if no handler is registered for the
    /// signature, [`WorkerError::Invoke`] if the invocation failed.
    pub async fn run_once(&self, task: &Task) -> Result<(), WorkerError> {
        self.shared.execute(task).await
    }

    /// Poll and dispatch until shutdown, then wait for every admitted task.
    ///
    /// A handler that never returns keeps this from returning; running tasks
    /// are not cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::AlreadyStarted`] if the pool is not idle.
    pub async fn start(&self) -> Result<(), WorkerError> {
        self.transition(PoolState::Idle, PoolState::Running)?;
        info!(
            worker_id = %self.shared.worker_id,
            parallelism = self.config.parallelism,
            "worker pool started"
        );

        // Capacity 1 so the poll loop blocks until the dispatcher is ready for more.
        let (intake_tx, intake_rx) = mpsc::channel::<Task>(1);
        let poller = tokio::spawn(poll_loop(
            Arc::clone(&self.queue),
            intake_tx,
            Arc::clone(&self.shared),
            self.shutdown.clone(),
            self.config.poll_interval(),
        ));

        self.dispatch_loop(intake_rx).await;

        self.set_state(PoolState::Draining);
        info!(
            worker_id = %self.shared.worker_id,
            active_tasks = self.shared.counters.active_tasks.load(Ordering::Relaxed),
            "worker pool draining"
        );

        if let Err(e) = poller.await {
            error!(worker_id = %self.shared.worker_id, error = %e, "poll loop aborted");
        }

        // Every permit back means every admitted task released its slot.
        match self.slots.acquire_many(self.permits).await {
            Ok(_drained) => {}
            Err(e) => error!(worker_id = %self.shared.worker_id, error = %e, "slot semaphore closed"),
        }

        self.set_state(PoolState::Stopped);
        info!(worker_id = %self.shared.worker_id, "worker pool stopped");
        Ok(())
    }

    async fn dispatch_loop(&self, mut intake: mpsc::Receiver<Task>) {
        loop {
            let task = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                next = intake.recv() => match next {
                    Some(task) => task,
                    None => break,
                },
            };

            let permit = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    debug!(
                        worker_id = %self.shared.worker_id,
                        signature = %task.signature,
                        "dropped task received before shutdown"
                    );
                    break;
                }
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let slot = SlotGuard::new(Arc::clone(&self.shared.counters), permit);
            tokio::spawn(Arc::clone(&self.shared).run_admitted(task, slot));
        }
    }

    fn transition(&self, from: PoolState, to: PoolState) -> Result<(), WorkerError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(WorkerError::AlreadyStarted);
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: PoolState) {
        *self.state.lock() = to;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Lets a detached signal listener exit.
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_id", &self.shared.worker_id)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn poll_loop(
    queue: Arc<dyn TaskQueue>,
    intake: mpsc::Sender<Task>,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    period: Duration,
) {
    let cx = Context::from_token(shutdown.child_token());
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'poll: loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let read = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            read = queue.read(&cx) => read,
        };

        let tasks = match read {
            Ok(tasks) => tasks,
            Err(e) => {
                shared.counters.poll_errors.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id = %shared.worker_id, error = %e, "queue read failed");
                let _ = shared.errors.send(WorkerError::QueueRead(e));
                continue;
            }
        };

        let mut pending = tasks.into_iter();
        while let Some(task) = pending.next() {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(
                        worker_id = %shared.worker_id,
                        dropped = pending.len() + 1,
                        "dropped intake after shutdown"
                    );
                    break 'poll;
                }
                sent = intake.send(task) => {
                    if sent.is_err() {
                        break 'poll;
                    }
                }
            }
        }
    }

    debug!(worker_id = %shared.worker_id, "poll loop stopped");
}
