//! Integration tests for task construction and the wire encoding.
//!
//! These tests cover:
//! - Exact-kind validation for every wire type
//! - All-or-nothing task construction
//! - Canonical encoding of struct arguments
//! - Lossless encode/decode for the mixed-type case

use eostre_worker::core::{Arg, ArgType, PacketError, Task, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Probe {
    #[serde(rename = "Test")]
    test: i32,
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_every_kind_accepts_its_native_value() {
    let args = vec![
        Arg::new(ArgType::Float64, 1.5_f64).unwrap(),
        Arg::new(ArgType::Float32, 1.5_f32).unwrap(),
        Arg::new(ArgType::Int64, 1_i64).unwrap(),
        Arg::new(ArgType::Int32, 1_i32).unwrap(),
        Arg::new(ArgType::Int, 1_isize).unwrap(),
        Arg::new(ArgType::Int16, 1_i16).unwrap(),
        Arg::new(ArgType::Int8, 1_i8).unwrap(),
        Arg::new(ArgType::String, "asdf").unwrap(),
        Arg::new(ArgType::Bytes, vec![1_u8, 2, 3]).unwrap(),
        Arg::new(ArgType::Bool, true).unwrap(),
        Arg::structured(&Probe { test: 1 }).unwrap(),
    ];
    let task = Task::new("all", args).unwrap();
    assert_eq!(task.args.len(), 11);
}

#[test]
fn test_int_tag_rejects_float_value() {
    let args = vec![Arg {
        kind: ArgType::Int,
        value: Value::Float64(3.0),
    }];
    let err = Task::new("add", args).unwrap_err();
    assert!(matches!(
        err,
        PacketError::InvalidType { ref expected, ref got } if expected == "int" && got == "float64"
    ));
}

#[test]
fn test_no_implicit_widening() {
    assert!(Arg::new(ArgType::Int64, 1_i32).is_err());
    assert!(Arg::new(ArgType::Int32, 1_i16).is_err());
    assert!(Arg::new(ArgType::Float64, 1_f32).is_err());
    assert!(Arg::new(ArgType::Bytes, "not bytes").is_err());
    assert!(Arg::new(ArgType::Bool, 0_i8).is_err());
}

#[test]
fn test_first_invalid_arg_aborts_task() {
    let args = vec![
        Arg::new(ArgType::Bool, true).unwrap(),
        Arg {
            kind: ArgType::String,
            value: Value::Bool(false),
        },
        Arg {
            kind: ArgType::Int8,
            value: Value::Int64(1),
        },
    ];
    let err = Task::new("mixed", args).unwrap_err();
    assert!(matches!(err, PacketError::InvalidType { ref expected, .. } if expected == "string"));
}

// ============================================================================
// STRUCT ARGUMENTS
// ============================================================================

#[test]
fn test_struct_arg_holds_canonical_bytes() {
    let task = Task::new("s", vec![Arg::structured(&Probe { test: 1 }).unwrap()]).unwrap();
    assert_eq!(task.args[0].value, Value::Encoded(br#"{"Test":1}"#.to_vec()));
}

#[test]
fn test_struct_from_raw_record_is_normalized_by_task() {
    let raw = Arg {
        kind: ArgType::Struct,
        value: Value::Record(serde_json::json!({"b": 2, "a": 1})),
    };
    let task = Task::new("s", vec![raw]).unwrap();
    assert_eq!(task.args[0].value, Value::Encoded(br#"{"a":1,"b":2}"#.to_vec()));
}

#[test]
fn test_struct_from_encoded_bytes_is_normalized_by_task() {
    let raw = Arg {
        kind: ArgType::Struct,
        value: Value::Encoded(br#"{ "b": 2,  "a": 1 }"#.to_vec()),
    };
    let task = Task::new("s", vec![raw]).unwrap();
    assert_eq!(task.args[0].value, Value::Encoded(br#"{"a":1,"b":2}"#.to_vec()));
}

#[test]
fn test_non_finite_float_cannot_build_task() {
    assert!(Arg::new(ArgType::Float64, f64::NAN).is_err());
    assert!(Arg::new(ArgType::Float32, f32::NEG_INFINITY).is_err());

    let raw = Arg {
        kind: ArgType::Float64,
        value: Value::Float64(f64::INFINITY),
    };
    let err = Task::new("f", vec![raw]).unwrap_err();
    assert!(matches!(err, PacketError::InvalidType { ref expected, .. } if expected == "float64"));
}

#[test]
fn test_struct_rejects_scalar() {
    assert!(Arg::structured(&5_u32).is_err());
    assert!(Arg::structured(&"text").is_err());
}

// ============================================================================
// WIRE ENCODING
// ============================================================================

#[test]
fn test_encode_decode_mixed_task() {
    let task = Task::new(
        "mixed",
        vec![
            Arg::new(ArgType::Int16, -3_i16).unwrap(),
            Arg::new(ArgType::Float32, 0.25_f32).unwrap(),
            Arg::new(ArgType::Bytes, b"\x00\xff".as_slice()).unwrap(),
            Arg::structured(&Probe { test: 9 }).unwrap(),
            Arg::new(ArgType::String, "hi").unwrap(),
        ],
    )
    .unwrap();

    let decoded = Task::decode(&task.encode().unwrap()).unwrap();
    assert_eq!(decoded, task);
}

#[test]
fn test_wire_shape() {
    let task = Task::new(
        "add",
        vec![
            Arg::new(ArgType::Int, 3_isize).unwrap(),
            Arg::new(ArgType::Int, 4_isize).unwrap(),
        ],
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&task.encode().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "signature": "add",
            "args": [{"type": "int", "value": 3}, {"type": "int", "value": 4}]
        })
    );
}

#[test]
fn test_decode_rejects_mismatched_value() {
    let wire = br#"{"signature":"x","args":[{"type":"bool","value":"yes"}]}"#;
    assert!(matches!(Task::decode(wire), Err(PacketError::Decode(_))));

    let wire = br#"{"signature":"x","args":[{"type":"struct","value":[1]}]}"#;
    assert!(Task::decode(wire).is_err());

    let wire = br#"{"signature":"x","args":[{"type":"uint","value":1}]}"#;
    assert!(Task::decode(wire).is_err());
}

#[test]
fn test_decode_missing_args_is_empty() {
    let task = Task::decode(br#"{"signature":"bare"}"#).unwrap();
    assert!(task.args.is_empty());
}
