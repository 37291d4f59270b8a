//! Wire model: typed arguments and tasks.
//!
//! A [`Task`] is a handler signature plus an ordered list of [`Arg`]s. Each
//! argument carries an [`ArgType`] tag and a [`Value`] whose runtime kind must
//! match the tag exactly; no widening happens here. Coercion into a handler's
//! native parameter types is the job of the invocation engine, which is the
//! only place that knows those types.
//!
//! The wire encoding is JSON:
//!
//! ```json
//! {"signature":"add","args":[{"type":"int","value":3},{"type":"bytes","value":"aGk="}]}
//! ```
//!
//! `bytes` travel as base64 strings, `struct` values are embedded as JSON, and
//! every other value is decoded according to its tag so round trips keep the
//! exact native width.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::core::PacketError;

/// Closed set of wire value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgType {
    /// `f64`.
    #[serde(rename = "float64")]
    Float64,
    /// `f32`.
    #[serde(rename = "float32")]
    Float32,
    /// `i64`.
    #[serde(rename = "int64")]
    Int64,
    /// `i32`.
    #[serde(rename = "int32")]
    Int32,
    /// Platform integer, `isize`.
    #[serde(rename = "int")]
    Int,
    /// `i16`.
    #[serde(rename = "int16")]
    Int16,
    /// `i8`.
    #[serde(rename = "int8")]
    Int8,
    /// `String`.
    #[serde(rename = "string")]
    String,
    /// `Vec<u8>`.
    #[serde(rename = "bytes")]
    Bytes,
    /// Any record type, carried as canonical JSON bytes.
    #[serde(rename = "struct")]
    Struct,
    /// `bool`.
    #[serde(rename = "bool")]
    Bool,
}

impl ArgType {
    /// Wire tag for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float64 => "float64",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Int32 => "int32",
            Self::Int => "int",
            Self::Int16 => "int16",
            Self::Int8 => "int8",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Struct => "struct",
            Self::Bool => "bool",
        }
    }

    /// Name of the canonical Rust type a handler parameter must declare.
    #[must_use]
    pub const fn native_name(self) -> &'static str {
        match self {
            Self::Float64 => "f64",
            Self::Float32 => "f32",
            Self::Int64 => "i64",
            Self::Int32 => "i32",
            Self::Int => "isize",
            Self::Int16 => "i16",
            Self::Int8 => "i8",
            Self::String => "String",
            Self::Bytes => "Vec<u8>",
            Self::Struct => "Json<T>",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamically typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit float.
    Float64(f64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit integer.
    Int64(i64),
    /// 32-bit integer.
    Int32(i32),
    /// Platform integer.
    Int(isize),
    /// 16-bit integer.
    Int16(i16),
    /// 8-bit integer.
    Int8(i8),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Boolean.
    Bool(bool),
    /// Structured value as supplied by a producer, before validation.
    Record(serde_json::Value),
    /// Canonical JSON encoding of a record; the only form a validated `struct` arg holds.
    Encoded(Vec<u8>),
}

impl Value {
    /// Build a [`Value::Record`] from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Encode`] if `value` cannot be represented as JSON.
    pub fn record<T: Serialize + ?Sized>(value: &T) -> Result<Self, PacketError> {
        Ok(Self::Record(serde_json::to_value(value)?))
    }

    /// Runtime kind name, reported as the `got` side of type errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Float64(_) => "float64",
            Self::Float32(_) => "float32",
            Self::Int64(_) => "int64",
            Self::Int32(_) => "int32",
            Self::Int(_) => "int",
            Self::Int16(_) => "int16",
            Self::Int8(_) => "int8",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Bool(_) => "bool",
            Self::Record(json) => json_kind_name(json),
            Self::Encoded(_) => "encoded",
        }
    }

    /// The wire type whose runtime kind this value has, if any.
    const fn native_type(&self) -> Option<ArgType> {
        match self {
            Self::Float64(_) => Some(ArgType::Float64),
            Self::Float32(_) => Some(ArgType::Float32),
            Self::Int64(_) => Some(ArgType::Int64),
            Self::Int32(_) => Some(ArgType::Int32),
            Self::Int(_) => Some(ArgType::Int),
            Self::Int16(_) => Some(ArgType::Int16),
            Self::Int8(_) => Some(ArgType::Int8),
            Self::String(_) => Some(ArgType::String),
            Self::Bytes(_) => Some(ArgType::Bytes),
            Self::Bool(_) => Some(ArgType::Bool),
            Self::Record(_) | Self::Encoded(_) => None,
        }
    }
}

const fn json_kind_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "slice",
        serde_json::Value::Object(_) => "struct",
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )+
    };
}

impl_value_from!(
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
    serde_json::Value => Record,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

/// A single typed task argument.
///
/// Fields are public so callers can assemble arguments freely; validation
/// happens in [`Arg::new`] and again in [`Task::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Declared wire type.
    pub kind: ArgType,
    /// Stored value.
    pub value: Value,
}

impl Arg {
    /// Build and validate an argument.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::InvalidType`] when the value's runtime kind does
    /// not match `kind`, or when a float is NaN or infinite.
    pub fn new(kind: ArgType, value: impl Into<Value>) -> Result<Self, PacketError> {
        let mut arg = Self {
            kind,
            value: value.into(),
        };
        arg.assert()?;
        Ok(arg)
    }

    /// Build a `struct` argument from any serializable record.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::InvalidType`] if `value` does not serialize to a
    /// JSON object, or [`PacketError::Encode`] if it cannot be serialized at all.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, PacketError> {
        Self::new(ArgType::Struct, Value::record(value)?)
    }

    /// Validate the value against the declared type, normalizing records to
    /// their canonical encoded form.
    fn assert(&mut self) -> Result<(), PacketError> {
        let encoded = match (self.kind, &self.value) {
            // serde_json's map is ordered, so the encoding is canonical.
            (ArgType::Struct, Value::Record(json @ serde_json::Value::Object(_))) => {
                serde_json::to_vec(json)?
            }
            // Pre-encoded bytes are re-encoded so whitespace and key order match.
            (ArgType::Struct, Value::Encoded(bytes)) => {
                match serde_json::from_slice::<serde_json::Value>(bytes) {
                    Ok(json @ serde_json::Value::Object(_)) => serde_json::to_vec(&json)?,
                    _ => return Err(PacketError::invalid_type("struct", "encoded")),
                }
            }
            (ArgType::Struct, other) => {
                return Err(PacketError::invalid_type("struct", other.kind_name()));
            }
            // JSON has no NaN or infinity.
            (ArgType::Float64, Value::Float64(v)) if !v.is_finite() => {
                return Err(PacketError::invalid_type("float64", "non-finite float64"));
            }
            (ArgType::Float32, Value::Float32(v)) if !v.is_finite() => {
                return Err(PacketError::invalid_type("float32", "non-finite float32"));
            }
            (kind, value) if value.native_type() == Some(kind) => return Ok(()),
            (kind, value) => {
                return Err(PacketError::invalid_type(kind.as_str(), value.kind_name()));
            }
        };
        self.value = Value::Encoded(encoded);
        Ok(())
    }
}

/// A wire-level unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Name of the handler this task targets.
    pub signature: String,
    /// Ordered arguments, excluding the injected capability.
    pub args: Vec<Arg>,
}

impl Task {
    /// Build a task, validating every argument.
    ///
    /// Construction is all-or-nothing: the first invalid argument aborts it.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::InvalidType`] for the first argument whose value
    /// does not match its declared type.
    pub fn new(signature: impl Into<String>, args: Vec<Arg>) -> Result<Self, PacketError> {
        let mut args = args;
        for arg in &mut args {
            arg.assert()?;
        }
        Ok(Self {
            signature: signature.into(),
            args,
        })
    }

    /// Encode the task for transport.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Encode`] if an argument holds a value that has no
    /// wire form. Only arguments assembled by hand can hit this: an
    /// unvalidated record or a NaN/infinite float that skipped [`Arg::new`].
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a task produced by [`Task::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Decode`] if the payload is malformed or a value
    /// does not fit its declared type.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        serde_json::from_slice(bytes).map_err(|e| PacketError::Decode(e.to_string()))
    }
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Arg", 2)?;
        state.serialize_field("type", &self.kind)?;
        match &self.value {
            Value::Float64(v) if !v.is_finite() => return Err(non_finite::<S>("float64")),
            Value::Float32(v) if !v.is_finite() => return Err(non_finite::<S>("float32")),
            Value::Float64(v) => state.serialize_field("value", v)?,
            Value::Float32(v) => state.serialize_field("value", v)?,
            Value::Int64(v) => state.serialize_field("value", v)?,
            Value::Int32(v) => state.serialize_field("value", v)?,
            Value::Int(v) => state.serialize_field("value", v)?,
            Value::Int16(v) => state.serialize_field("value", v)?,
            Value::Int8(v) => state.serialize_field("value", v)?,
            Value::String(v) => state.serialize_field("value", v)?,
            Value::Bool(v) => state.serialize_field("value", v)?,
            Value::Bytes(v) => state.serialize_field("value", &BASE64.encode(v))?,
            Value::Encoded(bytes) => {
                let json: serde_json::Value =
                    serde_json::from_slice(bytes).map_err(<S::Error as ser::Error>::custom)?;
                state.serialize_field("value", &json)?;
            }
            Value::Record(_) => {
                return Err(ser::Error::custom(
                    "struct argument was not validated before encoding",
                ))
            }
        }
        state.end()
    }
}

fn non_finite<S: Serializer>(kind: &str) -> S::Error {
    ser::Error::custom(format!("non-finite {kind} has no wire form"))
}

#[derive(Deserialize)]
struct WireArg {
    #[serde(rename = "type")]
    kind: ArgType,
    value: serde_json::Value,
}

impl<'de> Deserialize<'de> for Arg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireArg::deserialize(deserializer)?;
        let value =
            decode_value(wire.kind, wire.value).map_err(<D::Error as de::Error>::custom)?;
        Ok(Self {
            kind: wire.kind,
            value,
        })
    }
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Task", 2)?;
        state.serialize_field("signature", &self.signature)?;
        state.serialize_field("args", &self.args)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct WireTask {
    signature: String,
    #[serde(default)]
    args: Vec<Arg>,
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireTask::deserialize(deserializer)?;
        Ok(Self {
            signature: wire.signature,
            args: wire.args,
        })
    }
}

fn decode_value(kind: ArgType, json: serde_json::Value) -> Result<Value, PacketError> {
    let mismatch = |json: &serde_json::Value| PacketError::invalid_type(kind.as_str(), json_kind_name(json));
    let value = match kind {
        ArgType::Float64 => json.as_f64().map(Value::Float64),
        #[allow(clippy::cast_possible_truncation)]
        ArgType::Float32 => json
            .as_f64()
            .map(|v| v as f32)
            .filter(|v| v.is_finite())
            .map(Value::Float32),
        ArgType::Int64 => json.as_i64().map(Value::Int64),
        ArgType::Int32 => json.as_i64().and_then(|v| i32::try_from(v).ok()).map(Value::Int32),
        ArgType::Int => json.as_i64().and_then(|v| isize::try_from(v).ok()).map(Value::Int),
        ArgType::Int16 => json.as_i64().and_then(|v| i16::try_from(v).ok()).map(Value::Int16),
        ArgType::Int8 => json.as_i64().and_then(|v| i8::try_from(v).ok()).map(Value::Int8),
        ArgType::Bool => json.as_bool().map(Value::Bool),
        ArgType::String => match json {
            serde_json::Value::String(s) => return Ok(Value::String(s)),
            ref other => return Err(mismatch(other)),
        },
        ArgType::Bytes => match json.as_str() {
            Some(encoded) => Some(Value::Bytes(
                BASE64
                    .decode(encoded)
                    .map_err(|e| PacketError::Decode(format!("invalid base64: {e}")))?,
            )),
            None => None,
        },
        ArgType::Struct => match json {
            serde_json::Value::Object(_) => Some(Value::Encoded(serde_json::to_vec(&json)?)),
            _ => None,
        },
    };
    value.ok_or_else(|| mismatch(&json))
}
