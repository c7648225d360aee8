// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::{ensure_args_count, sequence, BuiltinFcn, StdFn};
use crate::errors::Result;
use crate::registry::CapabilityRegistry;
use crate::value::{HostRef, Value};

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;

#[rustfmt::skip]
const FUNCTIONS: &[(&str, BuiltinFcn)] = &[
    ("count",       count),
    ("first",       first),
    ("take",        take),
    ("drop",        drop_),
    ("reverse",     reverse),
    ("lower",       lower),
    ("upper",       upper),
    ("find",        find),
    ("materialize", materialize),
];

lazy_static! {
    static ref MODULE: Value = {
	let mut m: BTreeMap<Arc<str>, Value> = BTreeMap::new();
	for &(name, fcn) in FUNCTIONS {
	    m.insert(name.into(), Value::Opaque(HostRef::new(StdFn { name, fcn })));
	}
	Value::from(m)
    };
}

/// The always-available core module, used as the global scope layer of
/// every evaluation.
pub fn module() -> Value {
    MODULE.clone()
}

/// Number of elements in a sequence, or characters in a string.
fn count(registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("count", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.chars().count())),
        other => Ok(Value::from(sequence(registry, other)?.len())),
    }
}

/// First element of a sequence, or null when it is empty.
fn first(registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("first", args, 1)?;
    Ok(sequence(registry, &args[0])?
        .into_iter()
        .next()
        .unwrap_or(Value::Null))
}

/// take(count, x): the first `count` elements of `x`.
fn take(registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("take", args, 2)?;
    let count = args[0].as_number()?.as_i64().unwrap_or(0).max(0) as usize;
    let mut values = sequence(registry, &args[1])?;
    values.truncate(count);
    Ok(Value::from(values))
}

/// drop(count, x): everything after the first `count` elements of `x`.
fn drop_(registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("drop", args, 2)?;
    let count = args[0].as_number()?.as_i64().unwrap_or(0).max(0) as usize;
    let values = sequence(registry, &args[1])?;
    Ok(Value::from(
        values.into_iter().skip(count).collect::<Vec<_>>(),
    ))
}

fn reverse(registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("reverse", args, 1)?;
    let mut values = sequence(registry, &args[0])?;
    values.reverse();
    Ok(Value::from(values))
}

fn lower(_registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("lower", args, 1)?;
    Ok(Value::from(args[0].as_str()?.to_lowercase()))
}

fn upper(_registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("upper", args, 1)?;
    Ok(Value::from(args[0].as_str()?.to_uppercase()))
}

/// find(string, needle): character position of `needle`, or -1.
fn find(_registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("find", args, 2)?;
    let s = args[0].as_str()?;
    let needle = args[1].as_str()?;
    match s.find(needle) {
        Some(byte_idx) => Ok(Value::from(s[..byte_idx].chars().count())),
        None => Ok(Value::from(-1i64)),
    }
}

/// Force a lazy sequence (e.g. a data-source handle) into memory.
fn materialize(registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    ensure_args_count("materialize", args, 1)?;
    match &args[0] {
        v @ Value::Array(_) => Ok(v.clone()),
        other => Ok(Value::from(sequence(registry, other)?)),
    }
}
