//! In-memory FIFO queue holding wire-encoded tasks.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config::WorkerConfig;
use crate::core::{Context, QueueError, Task, TaskQueue};

/// Bounded in-process queue.
///
/// Tasks are stored in their wire encoding, so every task goes through the same
/// encode/decode path it would over a real transport. Reads return at most
/// `read_batch` tasks in send order.
#[derive(Debug)]
pub struct InMemoryQueue {
    max_depth: usize,
    read_batch: usize,
    tasks: Mutex<VecDeque<Vec<u8>>>,
}

impl InMemoryQueue {
    /// Create a queue holding at most `max_depth` tasks.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            read_batch: 32,
            tasks: Mutex::new(VecDeque::with_capacity(max_depth.min(1024))),
        }
    }

    /// Create a queue whose read batch follows [`WorkerConfig::read_batch`].
    ///
    /// Keep a handle to the returned queue for producers and hand a clone of
    /// the `Arc` to the pool.
    #[must_use]
    pub fn from_config(config: &WorkerConfig, max_depth: usize) -> Self {
        Self::new(max_depth).with_read_batch(config.read_batch)
    }

    /// Limit how many tasks one read returns. Zero is treated as one.
    #[must_use]
    pub fn with_read_batch(mut self, read_batch: usize) -> Self {
        self.read_batch = read_batch.max(1);
        self
    }

    /// Maximum depth allowed for this queue.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    fn push_encoded(&self, encoded: Vec<Vec<u8>>) -> Result<(), QueueError> {
        let mut tasks = self.tasks.lock();
        if tasks.len() + encoded.len() > self.max_depth {
            return Err(QueueError::QueueFull(format!(
                "max queue depth {} reached",
                self.max_depth
            )));
        }
        tasks.extend(encoded);
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn read(&self, _cx: &Context) -> Result<Vec<Task>, QueueError> {
        let mut tasks = self.tasks.lock();
        let mut batch = Vec::with_capacity(tasks.len().min(self.read_batch));
        // Decode before popping so a bad payload never takes good tasks with it.
        while batch.len() < self.read_batch {
            let Some(bytes) = tasks.front() else { break };
            match Task::decode(bytes) {
                Ok(task) => {
                    tasks.pop_front();
                    batch.push(task);
                }
                // Leave it at the head; the next read reports and drops it.
                Err(_) if !batch.is_empty() => break,
                Err(err) => {
                    tasks.pop_front();
                    warn!(error = %err, "dropping undecodable payload from memory queue");
                    return Err(err.into());
                }
            }
        }
        drop(tasks);
        trace!(count = batch.len(), "read tasks from memory queue");
        Ok(batch)
    }

    async fn send(&self, _cx: &Context, task: Task) -> Result<(), QueueError> {
        self.push_encoded(vec![task.encode()?])
    }

    async fn send_many(&self, _cx: &Context, tasks: Vec<Task>) -> Result<(), QueueError> {
        // All-or-nothing: encode and check depth before storing anything.
        let encoded = tasks
            .iter()
            .map(Task::encode)
            .collect::<Result<Vec<_>, _>>()?;
        self.push_encoded(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Arg, ArgType};

    fn task(n: i64) -> Task {
        Task::new("n", vec![Arg::new(ArgType::Int64, n).unwrap()]).unwrap()
    }

    #[tokio::test]
    async fn test_fifo_order_and_batch() {
        let cx = Context::background();
        let queue = InMemoryQueue::new(10).with_read_batch(2);
        queue.send_many(&cx, (0..3).map(task).collect()).await.unwrap();
        assert_eq!(queue.len(), 3);

        let first = queue.read(&cx).await.unwrap();
        assert_eq!(first, vec![task(0), task(1)]);
        let second = queue.read(&cx).await.unwrap();
        assert_eq!(second, vec![task(2)]);
        assert!(queue.read(&cx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_payload_does_not_lose_neighbours() {
        let cx = Context::background();
        let queue = InMemoryQueue::new(10);
        queue.send(&cx, task(1)).await.unwrap();
        queue
            .tasks
            .lock()
            .push_back(br#"{"signature":"f","args":[{"type":"float64","value":null}]}"#.to_vec());
        queue.send(&cx, task(2)).await.unwrap();

        assert_eq!(queue.read(&cx).await.unwrap(), vec![task(1)]);
        assert_eq!(queue.len(), 2);

        let err = queue.read(&cx).await.unwrap_err();
        assert!(matches!(err, QueueError::Codec(_)));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.read(&cx).await.unwrap(), vec![task(2)]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_float_never_reaches_queue() {
        let cx = Context::background();
        let queue = InMemoryQueue::new(10);
        let nan = Task {
            signature: "f".into(),
            args: vec![Arg {
                kind: ArgType::Float64,
                value: crate::core::Value::Float64(f64::INFINITY),
            }],
        };
        let err = queue.send_many(&cx, vec![task(1), nan, task(2)]).await.unwrap_err();
        assert!(matches!(err, QueueError::Codec(_)));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_from_config_uses_read_batch() {
        let cx = Context::background();
        let config = WorkerConfig::new().with_read_batch(2);
        let queue = InMemoryQueue::from_config(&config, 10);
        assert_eq!(queue.max_depth(), 10);
        queue.send_many(&cx, (0..5).map(task).collect()).await.unwrap();
        assert_eq!(queue.read(&cx).await.unwrap().len(), 2);
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn test_queue_full() {
        let cx = Context::background();
        let queue = InMemoryQueue::new(1);
        queue.send(&cx, task(1)).await.unwrap();
        let err = queue.send(&cx, task(2)).await.unwrap_err();
        assert!(matches!(err, QueueError::QueueFull(_)));
    }

    #[tokio::test]
    async fn test_send_many_is_all_or_nothing() {
        let cx = Context::background();
        let queue = InMemoryQueue::new(2);
        let err = queue
            .send_many(&cx, (0..3).map(task).collect())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::QueueFull(_)));
        assert!(queue.is_empty());
    }
}
