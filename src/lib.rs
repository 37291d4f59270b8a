//! # Eostre Worker
//!
//! The worker-side runtime of a task queue: typed wire tasks, a registry of
//! handlers, an invocation engine that calls arbitrary handler shapes, and a
//! bounded-concurrency pool that polls a queue and drains cleanly on shutdown.
//!
//! ## Core Pieces
//!
//! - **Task model**: a [`Task`](core::Task) is a signature plus typed
//!   [`Arg`](core::Arg)s, validated at construction and encoded as JSON.
//! - **Handler registry**: [`HandlerRegistry`](core::HandlerRegistry) maps
//!   signatures to handlers and rejects malformed handler shapes up front.
//! - **Invocation engine**: [`invoke`](core::invoke) checks arity and shape,
//!   coerces every argument, injects a [`Context`](core::Context), and turns
//!   panics into errors.
//! - **Worker pool**: [`WorkerPool`](core::WorkerPool) polls a
//!   [`TaskQueue`](core::TaskQueue), runs at most `parallelism` tasks at once,
//!   and reports every failure on an error stream.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eostre_worker::builders::WorkerBuilder;
//! use eostre_worker::core::{Arg, ArgType, Context, HandlerRegistry, Task, TaskQueue};
//! use eostre_worker::infra::InMemoryQueue;
//! use eostre_worker::util::{init_tracing, log_errors};
//!
//! init_tracing();
//!
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register("add", |_cx: Context, a: isize, b: isize| async move {
//!     tracing::info!(sum = a + b, "added");
//!     Ok::<(), std::io::Error>(())
//! })?;
//!
//! let queue = Arc::new(InMemoryQueue::new(1024));
//! queue
//!     .send(
//!         &Context::background(),
//!         Task::new("add", vec![Arg::new(ArgType::Int, 3_isize)?, Arg::new(ArgType::Int, 4_isize)?])?,
//!     )
//!     .await?;
//!
//! let pool = WorkerBuilder::from_env()?
//!     .queue(queue)
//!     .registry(registry)
//!     .build()?;
//! if let Some(errors) = pool.take_error_stream() {
//!     tokio::spawn(log_errors(errors));
//! }
//! let _signals = pool.listen_for_signals();
//! pool.start().await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, registry, invocation engine, and worker pool.
pub mod core;
/// Configuration models for the worker pool.
pub mod config;
/// Builders to construct worker pools from configuration.
pub mod builders;
/// Infrastructure adapters for queue backends.
pub mod infra;
/// Runtime adapters: OS signal handling.
pub mod runtime;
/// Shared utilities.
pub mod util;
