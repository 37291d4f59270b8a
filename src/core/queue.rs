//! Queue capability consumed by the worker pool.

use async_trait::async_trait;

use crate::core::{Context, QueueError, Task};

/// External task queue.
///
/// The pool only ever calls [`read`](Self::read); `send` and `send_many` are the
/// producer half of the same surface.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use eostre_worker::core::{Context, QueueError, Task, TaskQueue};
///
/// struct Empty;
///
/// #[async_trait]
/// impl TaskQueue for Empty {
///     async fn read(&self, _cx: &Context) -> Result<Vec<Task>, QueueError> {
///         Ok(Vec::new())
///     }
///     async fn send(&self, _cx: &Context, _task: Task) -> Result<(), QueueError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// Pull the next batch of tasks. An empty batch means nothing is ready.
    async fn read(&self, cx: &Context) -> Result<Vec<Task>, QueueError>;

    /// Push one task.
    async fn send(&self, cx: &Context, task: Task) -> Result<(), QueueError>;

    /// Push several tasks in order, stopping at the first failure.
    async fn send_many(&self, cx: &Context, tasks: Vec<Task>) -> Result<(), QueueError> {
        for task in tasks {
            self.send(cx, task).await?;
        }
        Ok(())
    }
}
