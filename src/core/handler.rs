//! Handler shapes and their type-erased form.
//!
//! Any async closure or function whose parameters all implement [`Parameter`]
//! and whose output implements [`HandlerOutput`] is a [`Handler`]. At
//! registration time it is erased into a [`BoxedHandler`]: a list of
//! parameter descriptors plus a thunk that takes already-coerced values. The
//! invocation engine reads the descriptors to decide how each wire argument
//! must be coerced, so it never needs to know the handler's concrete type.
//!
//! ```rust,ignore
//! use eostre_worker::core::{Context, Json, Operand};
//!
//! async fn add(_cx: Context, a: isize, b: isize) -> Result<(), std::io::Error> {
//!     println!("{}", a + b);
//!     Ok(())
//! }
//!
//! let operand = Operand::handler(add);
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::core::{ArgType, BoxError, Context, InvokeError};

/// A coerced argument on its way into a handler.
pub type BoxedValue = Box<dyn Any + Send>;

/// Future returned by an erased handler call.
pub type HandlerFuture = BoxFuture<'static, Result<(), BoxError>>;

/// How a handler parameter receives its value.
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    /// Accepts the cancellation capability; the function builds the parameter value.
    Capability(fn(Context) -> BoxedValue),
    /// Accepts the canonical native type of a wire type.
    Native(ArgType),
    /// Accepts a `struct` argument, decoded from its canonical JSON bytes.
    Struct(fn(&[u8]) -> Result<BoxedValue, serde_json::Error>),
}

/// Descriptor of a single handler parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Rust type name, for error messages.
    pub type_name: &'static str,
    /// Coercion rule for this parameter.
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Whether this parameter can receive the capability.
    #[must_use]
    pub const fn accepts_capability(&self) -> bool {
        matches!(self.kind, ParamKind::Capability(_))
    }
}

/// A type that can appear in a handler's parameter list.
pub trait Parameter: Send + Sized + 'static {
    /// Descriptor used by the invocation engine.
    fn spec() -> ParamSpec;
}

fn boxed_context(cx: Context) -> BoxedValue {
    Box::new(cx)
}

fn boxed_token(cx: Context) -> BoxedValue {
    Box::new(cx.token().clone())
}

impl Parameter for Context {
    fn spec() -> ParamSpec {
        ParamSpec {
            type_name: type_name::<Self>(),
            kind: ParamKind::Capability(boxed_context),
        }
    }
}

impl Parameter for CancellationToken {
    fn spec() -> ParamSpec {
        ParamSpec {
            type_name: type_name::<Self>(),
            kind: ParamKind::Capability(boxed_token),
        }
    }
}

macro_rules! impl_native_parameter {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl Parameter for $ty {
                fn spec() -> ParamSpec {
                    ParamSpec {
                        type_name: type_name::<Self>(),
                        kind: ParamKind::Native(ArgType::$kind),
                    }
                }
            }
        )+
    };
}

impl_native_parameter!(
    f64 => Float64,
    f32 => Float32,
    i64 => Int64,
    i32 => Int32,
    isize => Int,
    i16 => Int16,
    i8 => Int8,
    String => String,
    Vec<u8> => Bytes,
    bool => Bool,
);

/// Extractor for `struct` arguments.
///
/// A handler parameter `Json<T>` receives a `struct` argument deserialized
/// into `T`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwrap the decoded value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

fn decode_json<T>(bytes: &[u8]) -> Result<BoxedValue, serde_json::Error>
where
    T: DeserializeOwned + Send + 'static,
{
    let value: T = serde_json::from_slice(bytes)?;
    Ok(Box::new(Json(value)))
}

impl<T> Parameter for Json<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn spec() -> ParamSpec {
        ParamSpec {
            type_name: type_name::<Self>(),
            kind: ParamKind::Struct(decode_json::<T>),
        }
    }
}

/// Result shape of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// A single error result: `Result<(), E>`.
    Error,
    /// Anything else; not a valid handler result.
    Other(&'static str),
}

/// Values a handler future may resolve to.
pub trait HandlerOutput: Send + 'static {
    /// Shape reported to registration and the engine.
    fn shape() -> OutputShape;

    /// Normalize into the engine's outcome.
    ///
    /// # Errors
    ///
    /// Returns the handler's own error.
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl<E> HandlerOutput for Result<(), E>
where
    E: Into<BoxError> + Send + 'static,
{
    fn shape() -> OutputShape {
        OutputShape::Error
    }

    fn into_outcome(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

impl HandlerOutput for () {
    fn shape() -> OutputShape {
        OutputShape::Other("()")
    }

    fn into_outcome(self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A callable whose parameter list is described by `Args`.
///
/// Implemented for async functions and closures of up to twelve parameters.
pub trait Handler<Args>: Clone + Send + Sync + 'static {
    /// Parameter descriptors, in declaration order.
    fn params() -> Vec<ParamSpec>;

    /// Result shape.
    fn output() -> OutputShape;

    /// Call with coerced values, one per parameter.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::ParsingType`] if a value does not have the
    /// parameter's type.
    fn call(&self, args: Vec<BoxedValue>) -> Result<HandlerFuture, InvokeError>;
}

fn take<P: Parameter>(
    args: &mut impl Iterator<Item = (usize, BoxedValue)>,
) -> Result<P, InvokeError> {
    let Some((index, value)) = args.next() else {
        return Err(InvokeError::parsing(0, type_name::<P>(), "missing value"));
    };
    value
        .downcast::<P>()
        .map(|boxed| *boxed)
        .map_err(|_| InvokeError::parsing(index.saturating_sub(1), type_name::<P>(), "foreign value"))
}

impl<F, Fut, Out> Handler<()> for F
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: HandlerOutput,
{
    fn params() -> Vec<ParamSpec> {
        Vec::new()
    }

    fn output() -> OutputShape {
        Out::shape()
    }

    fn call(&self, _args: Vec<BoxedValue>) -> Result<HandlerFuture, InvokeError> {
        let fut = (self)();
        Ok(Box::pin(async move { fut.await.into_outcome() }))
    }
}

macro_rules! impl_handler {
    ($($param:ident),+) => {
        #[allow(non_snake_case)]
        impl<F, Fut, Out, $($param,)+> Handler<($($param,)+)> for F
        where
            F: Fn($($param),+) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Out> + Send + 'static,
            Out: HandlerOutput,
            $($param: Parameter,)+
        {
            fn params() -> Vec<ParamSpec> {
                vec![$($param::spec()),+]
            }

            fn output() -> OutputShape {
                Out::shape()
            }

            fn call(&self, args: Vec<BoxedValue>) -> Result<HandlerFuture, InvokeError> {
                let mut args = args.into_iter().enumerate();
                $(let $param = take::<$param>(&mut args)?;)+
                let fut = (self)($($param),+);
                Ok(Box::pin(async move { fut.await.into_outcome() }))
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);

type Thunk = dyn Fn(Vec<BoxedValue>) -> Result<HandlerFuture, InvokeError> + Send + Sync;

/// A handler with its concrete type erased.
#[derive(Clone)]
pub struct BoxedHandler {
    type_name: &'static str,
    params: Arc<[ParamSpec]>,
    output: OutputShape,
    thunk: Arc<Thunk>,
}

impl BoxedHandler {
    /// Erase a handler, capturing its parameter descriptors.
    pub fn new<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
    {
        Self {
            type_name: type_name::<H>(),
            params: H::params().into(),
            output: H::output(),
            thunk: Arc::new(move |args| handler.call(args)),
        }
    }

    /// Type name of the erased handler.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Parameter descriptors, capability included.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Result shape.
    #[must_use]
    pub const fn output(&self) -> OutputShape {
        self.output
    }

    pub(crate) fn call(&self, args: Vec<BoxedValue>) -> Result<HandlerFuture, InvokeError> {
        (self.thunk)(args)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedHandler")
            .field("type_name", &self.type_name)
            .field("params", &self.params.iter().map(|p| p.type_name).collect::<Vec<_>>())
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Whatever the engine is asked to call.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A callable handler.
    Handler(BoxedHandler),
    /// A value that is not callable, identified by its type name.
    Value(&'static str),
}

impl Operand {
    /// Wrap a handler.
    pub fn handler<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
    {
        Self::Handler(BoxedHandler::new(handler))
    }

    /// Wrap a non-callable value.
    #[must_use]
    pub fn value<T: ?Sized + 'static>(_value: &T) -> Self {
        Self::Value(type_name::<T>())
    }

    /// Type name of the operand.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Handler(handler) => handler.type_name(),
            Self::Value(name) => *name,
        }
    }
}

impl From<BoxedHandler> for Operand {
    fn from(handler: BoxedHandler) -> Self {
        Self::Handler(handler)
    }
}
