// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::{Error, Result};
use crate::value::{HostRef, Value};

use core::any::{Any, TypeId};
use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// A named contract of operations a host type may support.
///
/// Capabilities are satisfied per concrete type, not per instance, and are
/// resolved by the runtime type of a value. There is no inheritance-based
/// fallback: a type either registers a capability or it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Member access by name (`obj.member`).
    Structured,
    /// Keyed access (`obj[key]`).
    Associative,
    /// Equality and ordering against other values.
    Ordered,
    /// Iteration over a (possibly lazy, restartable) sequence of elements.
    Repeated,
    /// Application as a function.
    Applicative,
    /// Participation in arithmetic as a number.
    Number,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Structured => "structured",
            Capability::Associative => "associative",
            Capability::Ordered => "ordered",
            Capability::Repeated => "repeated",
            Capability::Applicative => "applicative",
            Capability::Number => "number",
        })
    }
}

/// Operations for the `structured` capability.
///
/// `resolve` must return `Error::Key` for members the object does not have;
/// other errors abort the whole lookup.
#[derive(Clone, Copy)]
pub struct StructuredOps {
    pub resolve: fn(&HostRef, &str) -> Result<Value>,
    pub members: fn(&HostRef) -> Vec<Arc<str>>,
}

/// Operations for the `associative` capability.
#[derive(Clone, Copy)]
pub struct AssociativeOps {
    pub select: fn(&HostRef, &Value) -> Result<Value>,
}

/// Operations for the `ordered` capability.
#[derive(Clone, Copy)]
pub struct OrderedOps {
    pub cmp: fn(&HostRef, &Value) -> Result<Ordering>,
}

/// Operations for the `repeated` capability. The returned iterator may be
/// lazy and should be restartable; solvers consume it single-pass.
#[derive(Clone, Copy)]
pub struct RepeatedOps {
    pub values: fn(&HostRef) -> Result<Box<dyn Iterator<Item = Result<Value>> + Send>>,
}

/// Operations for the `applicative` capability. This is the only way a
/// query can call into host code. The registry is passed through so
/// functions can themselves dispatch on their arguments.
#[derive(Clone, Copy)]
pub struct ApplicativeOps {
    pub apply: fn(&HostRef, &CapabilityRegistry, &[Value]) -> Result<Value>,
}

/// Operations for the `number` capability.
#[derive(Clone, Copy)]
pub struct NumberOps {
    pub as_number: fn(&HostRef) -> Result<crate::Number>,
}

/// One capability's operation table.
#[derive(Clone, Copy)]
pub enum CapabilityImpl {
    Structured(StructuredOps),
    Associative(AssociativeOps),
    Ordered(OrderedOps),
    Repeated(RepeatedOps),
    Applicative(ApplicativeOps),
    Number(NumberOps),
}

impl CapabilityImpl {
    pub const fn capability(&self) -> Capability {
        match self {
            CapabilityImpl::Structured(_) => Capability::Structured,
            CapabilityImpl::Associative(_) => Capability::Associative,
            CapabilityImpl::Ordered(_) => Capability::Ordered,
            CapabilityImpl::Repeated(_) => Capability::Repeated,
            CapabilityImpl::Applicative(_) => Capability::Applicative,
            CapabilityImpl::Number(_) => Capability::Number,
        }
    }
}

/// Thread-safe table mapping (capability, concrete host type) to the
/// operations that type registered.
///
/// Lookup is on the hot path of every dispatching AST node, so entries are
/// keyed by `TypeId` in a hash map. Registration is expected to happen
/// during process warm-up; concurrent reads are safe at any time.
pub struct CapabilityRegistry {
    inner: DashMap<(Capability, TypeId), CapabilityImpl>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Record the operations type `T` provides for one capability.
    ///
    /// Registering the same (capability, type) pair twice fails with
    /// `DuplicateBinding`, since silent re-registration hides bugs. Use
    /// [`CapabilityRegistry::replace`] when overriding is intended.
    pub fn register<T: Any + Send + Sync>(&self, imp: CapabilityImpl) -> Result<()> {
        let capability = imp.capability();
        let key = (capability, TypeId::of::<T>());

        use dashmap::mapref::entry::Entry;
        match self.inner.entry(key) {
            Entry::Occupied(_) => Err(Error::DuplicateBinding {
                capability,
                type_name: core::any::type_name::<T>(),
            }),
            Entry::Vacant(e) => {
                log::debug!(
                    "registered {} capability for {}",
                    capability,
                    core::any::type_name::<T>()
                );
                e.insert(imp);
                Ok(())
            }
        }
    }

    /// Register, replacing any previous binding for the same pair.
    pub fn replace<T: Any + Send + Sync>(&self, imp: CapabilityImpl) {
        let key = (imp.capability(), TypeId::of::<T>());
        self.inner.insert(key, imp);
    }

    pub fn contains(&self, capability: Capability, host: &HostRef) -> bool {
        self.inner.contains_key(&(capability, host.type_id()))
    }

    /// Look up the operation table for `host`'s runtime type.
    pub fn resolve(&self, capability: Capability, host: &HostRef) -> Result<CapabilityImpl> {
        match self.inner.get(&(capability, host.type_id())) {
            Some(entry) => Ok(*entry.value()),
            None => Err(Error::UnsupportedCapability {
                capability,
                type_name: host.type_name().to_string(),
            }),
        }
    }

    pub fn structured(&self, host: &HostRef) -> Result<StructuredOps> {
        match self.resolve(Capability::Structured, host)? {
            CapabilityImpl::Structured(ops) => Ok(ops),
            _ => Err(self.mismatch(Capability::Structured, host)),
        }
    }

    pub fn associative(&self, host: &HostRef) -> Result<AssociativeOps> {
        match self.resolve(Capability::Associative, host)? {
            CapabilityImpl::Associative(ops) => Ok(ops),
            _ => Err(self.mismatch(Capability::Associative, host)),
        }
    }

    pub fn ordered(&self, host: &HostRef) -> Result<OrderedOps> {
        match self.resolve(Capability::Ordered, host)? {
            CapabilityImpl::Ordered(ops) => Ok(ops),
            _ => Err(self.mismatch(Capability::Ordered, host)),
        }
    }

    pub fn repeated(&self, host: &HostRef) -> Result<RepeatedOps> {
        match self.resolve(Capability::Repeated, host)? {
            CapabilityImpl::Repeated(ops) => Ok(ops),
            _ => Err(self.mismatch(Capability::Repeated, host)),
        }
    }

    pub fn applicative(&self, host: &HostRef) -> Result<ApplicativeOps> {
        match self.resolve(Capability::Applicative, host)? {
            CapabilityImpl::Applicative(ops) => Ok(ops),
            _ => Err(self.mismatch(Capability::Applicative, host)),
        }
    }

    pub fn number(&self, host: &HostRef) -> Result<NumberOps> {
        match self.resolve(Capability::Number, host)? {
            CapabilityImpl::Number(ops) => Ok(ops),
            _ => Err(self.mismatch(Capability::Number, host)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    // A stored table whose variant disagrees with its key can only come from
    // registry-internal misuse; surface it as a missing capability.
    fn mismatch(&self, capability: Capability, host: &HostRef) -> Error {
        Error::UnsupportedCapability {
            capability,
            type_name: host.type_name().to_string(),
        }
    }
}

/// Global default registry, pre-populated with the standard library's host
/// types. Engines use this unless constructed with an explicit registry.
pub fn global() -> Arc<CapabilityRegistry> {
    lazy_static::lazy_static! {
        static ref GLOBAL: Arc<CapabilityRegistry> = {
            let registry = CapabilityRegistry::new();
            crate::builtins::register_host_types(&registry);
            Arc::new(registry)
        };
    }
    GLOBAL.clone()
}
