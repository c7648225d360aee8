// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::{HostRef, Number, Value};

#[test]
fn json_round_trip() -> Result<()> {
    let v = Value::from_json_str(r#"{"a": [1, 2.5, "x"], "b": {"c": true, "d": null}}"#)?;
    let json = v.to_json_str()?;
    let again = Value::from_json_str(&json)?;
    assert_eq!(v, again);
    Ok(())
}

#[test]
fn numbers_compare_across_representations() {
    assert_eq!(Value::from(1i64), Value::from(1.0));
    assert_ne!(Value::from(1i64), Value::from(1.5));
    assert!(Value::from(2i64) > Value::from(1.5));
}

#[test]
fn integer_floats_serialize_without_fraction() -> Result<()> {
    assert_eq!(serde_json::to_string(&Value::from(1.0))?, "1");
    assert_eq!(serde_json::to_string(&Value::from(1.5))?, "1.5");
    assert_eq!(serde_json::to_string(&Value::from(-3.0))?, "-3");
    Ok(())
}

#[test]
fn truthiness() {
    assert!(!Value::Null.truthy());
    assert!(!Value::from(false).truthy());
    assert!(!Value::from(0i64).truthy());
    assert!(!Value::from("").truthy());
    assert!(!Value::new_array().truthy());
    assert!(!Value::new_object().truthy());

    assert!(Value::from(true).truthy());
    assert!(Value::from(-1i64).truthy());
    assert!(Value::from("x").truthy());
    assert!(Value::from(vec![Value::Null]).truthy());
    assert!(Value::Opaque(HostRef::new(0u8)).truthy());
}

#[test]
fn index_misses_are_null() -> Result<()> {
    let v = Value::from_json_str(r#"{"a": [10, 20]}"#)?;
    assert_eq!(v["a"][0], Value::from(10i64));
    assert_eq!(v["a"][9], Value::Null);
    assert_eq!(v["missing"], Value::Null);
    Ok(())
}

#[test]
fn host_refs_compare_by_identity() {
    struct Widget;

    let a = Value::Opaque(HostRef::new(Widget));
    let b = Value::Opaque(HostRef::new(Widget));
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
}

#[test]
fn host_refs_downcast() {
    let h = HostRef::new(42i64);
    assert_eq!(h.downcast_ref::<i64>(), Some(&42));
    assert_eq!(h.downcast_ref::<String>(), None);
    assert_eq!(h.type_name(), "i64");
}

#[test]
fn opaque_serializes_as_placeholder() -> Result<()> {
    struct Widget;

    let v = Value::Opaque(HostRef::new(Widget));
    assert_eq!(serde_json::to_string(&v)?, "\"<Widget>\"");
    Ok(())
}

#[test]
fn number_arithmetic_kinds() {
    assert_eq!(Number::Int(7).add(&Number::Int(3)), Number::Int(10));
    assert_eq!(
        Number::Int(7).add(&Number::Float(0.5)),
        Number::Float(7.5)
    );
    assert_eq!(Number::Int(9).div(&Number::Int(3)), Some(Number::Int(3)));
    assert_eq!(
        Number::Int(9).div(&Number::Int(2)),
        Some(Number::Float(4.5))
    );
    assert_eq!(Number::Int(9).div(&Number::Int(0)), None);
}
