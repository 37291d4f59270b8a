//! Error types for task construction, invocation, registration, and the worker pool.

use thiserror::Error;

/// Boxed error carried across the handler boundary.
///
/// Handlers return `Result<(), E>` for any `E: Into<BoxError>`; the error reaches
/// the caller of [`invoke`](crate::core::invoke) unchanged inside
/// [`InvokeError::Handler`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while building or (de)serializing tasks.
#[derive(Debug, Error)]
pub enum PacketError {
    /// The value stored in an argument does not match its declared type.
    #[error("invalid type, expected: {expected}, got: {got}")]
    InvalidType {
        /// Declared wire type tag.
        expected: String,
        /// Runtime kind of the supplied value.
        got: String,
    },
    /// A structured value or task could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    /// A wire payload could not be turned back into a task.
    #[error("decode error: {0}")]
    Decode(String),
}

impl PacketError {
    pub(crate) fn invalid_type(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::InvalidType {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Errors produced by the invocation engine.
///
/// Every failure path of [`invoke`](crate::core::invoke) ends up here; nothing
/// unwinds past the engine.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The operand is not callable.
    #[error("operand is not a function: {0}")]
    NotAFunction(String),
    /// Task argument count (plus the injected capability) differs from the handler's parameter count.
    #[error("expected {expected} arguments to the function, got {got}")]
    ArgumentNumberMismatch {
        /// `task.args.len() + 1`.
        expected: usize,
        /// Number of parameters the handler declares.
        got: usize,
    },
    /// The handler's first parameter cannot accept the capability.
    #[error("operand first argument must accept a cancellation context")]
    FirstArgNotCapability,
    /// The handler does not produce a single error result.
    #[error("operands must only return error")]
    OperandResultMismatch,
    /// A wire argument could not be coerced into the handler's parameter type.
    #[error("arg type and value does not match at position {position}: expected {expected}, got {got}")]
    ParsingType {
        /// Zero-based index into `task.args`.
        position: usize,
        /// What the handler parameter needs.
        expected: String,
        /// What the wire argument carried.
        got: String,
    },
    /// The handler panicked with a value that is not an error.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    /// The handler's own error, returned or raised as a panic payload.
    #[error("{0}")]
    Handler(BoxError),
}

impl InvokeError {
    pub(crate) fn parsing(
        position: usize,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self::ParsingType {
            position,
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Errors produced when registering a handler.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Only callables can be registered.
    #[error("tasks must be functions, got {0}")]
    NotAFunction(String),
    /// A handler needs the capability plus at least one task argument.
    #[error("task must have at least two arguments, has {0}")]
    TooFewParameters(usize),
    /// The first parameter must accept the capability.
    #[error("tasks first argument must accept a cancellation context")]
    FirstArgNotCapability,
    /// The handler must return exactly one error result.
    #[error("task must have one return value of type error")]
    OperandResultMismatch,
}

/// Errors reported by queue backends.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue cannot accept more tasks.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
    /// A stored payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] PacketError),
}

/// Errors surfaced by the worker pool, mostly on its error stream.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Polling the queue failed; polling continues.
    #[error("queue read failed: {0}")]
    QueueRead(#[source] QueueError),
    /// No handler is registered for the task's signature.
    #[error("could not find task {0}")]
    HandlerNotFound(String),
    /// The handler was found but the invocation failed.
    #[error("task {signature} failed: {source}")]
    Invoke {
        /// Signature of the failed task.
        signature: String,
        /// Invocation failure.
        #[source]
        source: InvokeError,
    },
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `start` was called on a pool that already left the idle state.
    #[error("worker pool already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_type_display() {
        let err = PacketError::invalid_type("int64", "string");
        assert_eq!(err.to_string(), "invalid type, expected: int64, got: string");
    }

    #[test]
    fn test_argument_mismatch_display() {
        let err = InvokeError::ArgumentNumberMismatch { expected: 2, got: 3 };
        assert_eq!(err.to_string(), "expected 2 arguments to the function, got 3");
    }

    #[test]
    fn test_handler_error_displays_inner() {
        let inner: BoxError = "disk on fire".into();
        let err = InvokeError::Handler(inner);
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn test_worker_error_wraps_invoke() {
        let err = WorkerError::Invoke {
            signature: "add".into(),
            source: InvokeError::FirstArgNotCapability,
        };
        assert!(err.to_string().starts_with("task add failed"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
