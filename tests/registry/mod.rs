// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::{
    Capability, CapabilityImpl, CapabilityRegistry, Error, HostRef, OrderedOps, StructuredOps,
    Value,
};
use std::cmp::Ordering;
use std::sync::Arc;

struct Gadget;

fn gadget_resolve(_host: &HostRef, member: &str) -> filtrus::Result<Value> {
    match member {
        "id" => Ok(Value::from(1i64)),
        other => Err(Error::Key(other.to_string())),
    }
}

fn gadget_members(_host: &HostRef) -> Vec<Arc<str>> {
    vec!["id".into()]
}

fn gadget_cmp(_host: &HostRef, _other: &Value) -> filtrus::Result<Ordering> {
    Ok(Ordering::Equal)
}

fn structured_impl() -> CapabilityImpl {
    CapabilityImpl::Structured(StructuredOps {
        resolve: gadget_resolve,
        members: gadget_members,
    })
}

#[test]
fn duplicate_registration_is_rejected() {
    let registry = CapabilityRegistry::new();
    registry.register::<Gadget>(structured_impl()).unwrap();

    let err = registry.register::<Gadget>(structured_impl()).unwrap_err();
    match err {
        Error::DuplicateBinding {
            capability,
            type_name,
        } => {
            assert_eq!(capability, Capability::Structured);
            assert!(type_name.ends_with("Gadget"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn explicit_override_is_allowed() {
    let registry = CapabilityRegistry::new();
    registry.register::<Gadget>(structured_impl()).unwrap();
    // replace() is the deliberate override path; no error.
    registry.replace::<Gadget>(structured_impl());
    assert_eq!(registry.len(), 1);
}

#[test]
fn one_type_may_register_many_capabilities() {
    let registry = CapabilityRegistry::new();
    registry.register::<Gadget>(structured_impl()).unwrap();
    registry
        .register::<Gadget>(CapabilityImpl::Ordered(OrderedOps { cmp: gadget_cmp }))
        .unwrap();
    assert_eq!(registry.len(), 2);

    let host = HostRef::new(Gadget);
    assert!(registry.contains(Capability::Structured, &host));
    assert!(registry.contains(Capability::Ordered, &host));
    assert!(!registry.contains(Capability::Repeated, &host));
}

#[test]
fn resolution_is_per_concrete_type() {
    struct Other;

    let registry = CapabilityRegistry::new();
    registry.register::<Gadget>(structured_impl()).unwrap();

    // Another type does not inherit Gadget's table.
    let err = registry
        .structured(&HostRef::new(Other))
        .map(|_| ())
        .unwrap_err();
    match err {
        Error::UnsupportedCapability {
            capability,
            type_name,
        } => {
            assert_eq!(capability, Capability::Structured);
            assert_eq!(type_name, "Other");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn resolved_tables_dispatch() -> Result<()> {
    let registry = CapabilityRegistry::new();
    registry.register::<Gadget>(structured_impl()).unwrap();

    let host = HostRef::new(Gadget);
    let ops = registry.structured(&host)?;
    assert_eq!((ops.resolve)(&host, "id")?, Value::from(1i64));
    assert_eq!((ops.members)(&host), vec![Arc::<str>::from("id")]);

    let err = (ops.resolve)(&host, "nope").unwrap_err();
    assert!(matches!(err, Error::Key(_)));
    Ok(())
}

#[test]
fn registry_reads_are_concurrent() -> Result<()> {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.register::<Gadget>(structured_impl()).unwrap();

    let mut handles = vec![];
    for _ in 0..4 {
        let registry = registry.clone();
        handles.push(std::thread::spawn(move || {
            let host = HostRef::new(Gadget);
            for _ in 0..1000 {
                assert!(registry.structured(&host).is_ok());
            }
        }));
    }
    for handle in handles {
        if handle.join().is_err() {
            anyhow::bail!("reader thread panicked");
        }
    }
    Ok(())
}

#[test]
fn compiled_queries_evaluate_concurrently() -> Result<()> {
    use filtrus::{Dialect, Engine, Replacements};

    let engine = Engine::new();
    let query = Arc::new(engine.compile(Dialect::Sql, "age > 18", Replacements::None)?);

    let mut handles = vec![];
    for i in 0..4i64 {
        let engine = engine.clone();
        let query = query.clone();
        handles.push(std::thread::spawn(move || -> filtrus::Result<bool> {
            let mut row = Value::new_object();
            row.as_object_mut()?.insert("age".into(), Value::from(i * 10));
            engine.matches(&query, &row)
        }));
    }

    let results: Vec<bool> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked").expect("match failed"))
        .collect();
    assert_eq!(results, vec![false, false, true, true]);
    Ok(())
}
