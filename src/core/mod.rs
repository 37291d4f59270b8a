//! Task model, handler registry, invocation engine, and the worker pool.

pub mod context;
pub mod error;
pub mod executor;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod task;
pub mod worker_pool;

pub use context::Context;
pub use error::{BoxError, InvokeError, PacketError, QueueError, RegistryError, WorkerError};
pub use executor::{invoke, invoke_with_context};
pub use handler::{
    BoxedHandler, BoxedValue, Handler, HandlerFuture, HandlerOutput, Json, Operand, OutputShape,
    ParamKind, ParamSpec, Parameter,
};
pub use queue::TaskQueue;
pub use registry::HandlerRegistry;
pub use task::{Arg, ArgType, Task, Value};
pub use worker_pool::{PoolState, ShutdownHandle, WorkerPool, WorkerStats};
