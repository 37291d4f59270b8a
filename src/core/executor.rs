//! Invocation engine: match a wire task against an erased handler and call it.
//!
//! [`invoke`] runs the checks in a fixed order and fails fast:
//!
//! 1. the operand must be callable,
//! 2. `task.args.len() + 1` must equal the handler's parameter count,
//! 3. the first parameter must accept the capability,
//! 4. the handler must return a single error result,
//! 5. every argument must coerce into its parameter's native type.
//!
//! Only when all of them pass is the handler called, exactly once. Panics
//! raised anywhere past step 1 are caught and turned into an [`InvokeError`].

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::warn;

use crate::core::{
    Arg, ArgType, BoxError, BoxedHandler, BoxedValue, Context, InvokeError, Operand, OutputShape,
    ParamKind, ParamSpec, Task, Value,
};

/// Invoke `operand` with the arguments of `task` and a fresh background context.
///
/// # Panics as errors
///
/// A handler may abort with an error value through
/// [`std::panic::panic_any`]. Only two payload types are recognized: a
/// [`BoxError`], which comes back as [`InvokeError::Handler`], and an
/// [`InvokeError`], which comes back unchanged. A concrete error type panicked
/// without boxing it first (`panic_any(MyError)`) is not downcastable from
/// here and becomes [`InvokeError::TaskPanicked`]; box it as
/// `panic_any(BoxError::from(MyError))` instead.
///
/// # Errors
///
/// Returns the first failed check, the handler's own error as
/// [`InvokeError::Handler`], or [`InvokeError::TaskPanicked`] if the handler
/// panicked with a non-error payload.
pub async fn invoke(operand: &Operand, task: &Task) -> Result<(), InvokeError> {
    invoke_with_context(operand, task, Context::background()).await
}

/// Invoke `operand` with a caller-supplied context as the capability.
///
/// # Errors
///
/// Same as [`invoke`].
pub async fn invoke_with_context(
    operand: &Operand,
    task: &Task,
    cx: Context,
) -> Result<(), InvokeError> {
    let handler = check_shape(operand, task)?;

    let call = async move {
        let args = coerce_arguments(handler, task, cx)?;
        let fut = handler.call(args)?;
        fut.await.map_err(InvokeError::Handler)
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let err = recover(payload);
            warn!(signature = %task.signature, error = %err, "handler panicked");
            Err(err)
        }
    }
}

/// Validate that `operand` can be called with the arguments of `task`.
fn check_shape<'a>(operand: &'a Operand, task: &Task) -> Result<&'a BoxedHandler, InvokeError> {
    let handler = match operand {
        Operand::Handler(handler) => handler,
        Operand::Value(name) => return Err(InvokeError::NotAFunction((*name).to_string())),
    };

    // The capability is injected, so a handler takes one more parameter than the task has args.
    let params = handler.params();
    if task.args.len() + 1 != params.len() {
        return Err(InvokeError::ArgumentNumberMismatch {
            expected: task.args.len() + 1,
            got: params.len(),
        });
    }

    if !params[0].accepts_capability() {
        return Err(InvokeError::FirstArgNotCapability);
    }

    if handler.output() != OutputShape::Error {
        return Err(InvokeError::OperandResultMismatch);
    }

    Ok(handler)
}

fn coerce_arguments(
    handler: &BoxedHandler,
    task: &Task,
    cx: Context,
) -> Result<Vec<BoxedValue>, InvokeError> {
    let params = handler.params();
    let mut values = Vec::with_capacity(params.len());

    match params[0].kind {
        ParamKind::Capability(make) => values.push(make(cx)),
        _ => return Err(InvokeError::FirstArgNotCapability),
    }

    for (position, (arg, param)) in task.args.iter().zip(&params[1..]).enumerate() {
        values.push(coerce(position, arg, param)?);
    }
    Ok(values)
}

/// Coerce one wire argument into the native type of `param`.
fn coerce(position: usize, arg: &Arg, param: &ParamSpec) -> Result<BoxedValue, InvokeError> {
    let mismatch = || {
        InvokeError::parsing(
            position,
            param.type_name,
            format!("{} holding {}", arg.kind, arg.value.kind_name()),
        )
    };

    if arg.kind == ArgType::Struct {
        let (ParamKind::Struct(decode), Value::Encoded(bytes)) = (param.kind, &arg.value) else {
            return Err(mismatch());
        };
        return decode(bytes)
            .map_err(|e| InvokeError::parsing(position, param.type_name, format!("struct: {e}")));
    }

    if !matches!(param.kind, ParamKind::Native(target) if target == arg.kind) {
        return Err(mismatch());
    }

    let value: BoxedValue = match (arg.kind, &arg.value) {
        (ArgType::Float64, Value::Float64(v)) => Box::new(*v),
        (ArgType::Float32, Value::Float32(v)) => Box::new(*v),
        (ArgType::Int64, Value::Int64(v)) => Box::new(*v),
        (ArgType::Int32, Value::Int32(v)) => Box::new(*v),
        (ArgType::Int, Value::Int(v)) => Box::new(*v),
        (ArgType::Int16, Value::Int16(v)) => Box::new(*v),
        (ArgType::Int8, Value::Int8(v)) => Box::new(*v),
        (ArgType::String, Value::String(v)) => Box::new(v.clone()),
        (ArgType::Bytes, Value::Bytes(v)) => Box::new(v.clone()),
        (ArgType::Bool, Value::Bool(v)) => Box::new(*v),
        _ => return Err(mismatch()),
    };
    Ok(value)
}

/// Turn a panic payload into an error.
fn recover(payload: Box<dyn Any + Send>) -> InvokeError {
    let payload = match payload.downcast::<InvokeError>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<BoxError>() {
        Ok(err) => return InvokeError::Handler(*err),
        Err(payload) => payload,
    };

    let message = payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-error panic payload".to_string());
    InvokeError::TaskPanicked(message)
}
