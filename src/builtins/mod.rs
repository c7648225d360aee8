// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod core;
#[cfg(feature = "io")]
pub mod io;

use crate::errors::{Error, Result};
use crate::registry::{ApplicativeOps, CapabilityImpl, CapabilityRegistry};
use crate::value::{HostRef, Value};

pub type BuiltinFcn = fn(&CapabilityRegistry, &[Value]) -> Result<Value>;

/// A standard-library function. Each function the library exposes to
/// queries is one of these, reachable through a scope layer and applied
/// through the `applicative` capability like any other host function.
pub struct StdFn {
    pub name: &'static str,
    pub fcn: BuiltinFcn,
}

fn apply_std_fn(host: &HostRef, registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    match host.downcast_ref::<StdFn>() {
        Some(f) => (f.fcn)(registry, args),
        None => Err(Error::Type("not a standard function".to_string())),
    }
}

/// Register the standard library's host types with a registry. Called once
/// for the global default registry; custom registries that want the
/// standard library call this during warm-up.
pub fn register_host_types(registry: &CapabilityRegistry) {
    if let Err(e) = registry.register::<StdFn>(CapabilityImpl::Applicative(ApplicativeOps {
        apply: apply_std_fn,
    })) {
        log::warn!("standard library registration: {e}");
    }

    #[cfg(feature = "io")]
    io::register_host_types(registry);
}

pub(crate) fn ensure_args_count(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Materialize a sequence argument (array or repeated-capable host object)
/// into a vector of values.
pub(crate) fn sequence(registry: &CapabilityRegistry, value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.as_ref().clone()),
        Value::Opaque(host) => {
            let ops = registry.repeated(host)?;
            (ops.values)(host)?.collect()
        }
        other => Err(Error::Type(format!(
            "expected a sequence, got {}",
            other.kind_name()
        ))),
    }
}
