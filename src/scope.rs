// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::{Error, Result};
use crate::registry::CapabilityRegistry;
use crate::value::Value;

/// Stack of variable-binding layers from global (index 0) to local.
///
/// Each layer is either an object or a host value whose type registered the
/// `structured` capability. Name resolution walks local-first and returns
/// the first hit; layers are read-only during solving and the stack itself
/// is cheap to clone (layers are shared).
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    layers: Vec<Value>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { layers: vec![] }
    }

    pub fn from_layers(layers: Vec<Value>) -> Self {
        Self { layers }
    }

    /// A new stack with `local` pushed as the innermost layer.
    pub fn nested(&self, local: Value) -> Self {
        let mut layers = self.layers.clone();
        layers.push(local);
        Self { layers }
    }

    pub fn locals(&self) -> Option<&Value> {
        self.layers.last()
    }

    /// Resolve a variable name, consulting layers from local to global.
    ///
    /// A layer that does not define the name is skipped; any other failure
    /// (including a host layer missing the `structured` capability) aborts
    /// resolution.
    pub fn resolve(&self, name: &str, registry: &CapabilityRegistry) -> Result<Value> {
        for layer in self.layers.iter().rev() {
            match layer {
                Value::Object(map) => {
                    if let Some(v) = map.get(name) {
                        return Ok(v.clone());
                    }
                }
                Value::Opaque(host) => {
                    let ops = registry.structured(host)?;
                    match (ops.resolve)(host, name) {
                        Ok(v) => return Ok(v),
                        Err(Error::Key(_)) => (),
                        Err(e) => return Err(e),
                    }
                }
                Value::Null => (),
                other => {
                    return Err(Error::Type(format!(
                        "scope layers must be structured, got {}",
                        other.kind_name()
                    )))
                }
            }
        }
        Err(Error::Key(name.to_string()))
    }
}
