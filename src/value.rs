// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::number::Number;

use core::any::{Any, TypeId};
use core::cmp::Ordering;
use core::fmt;
use std::collections::BTreeMap;
use std::ops;
use std::sync::Arc;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A handle to an arbitrary host object.
///
/// The handle records the concrete runtime type of the wrapped object; the
/// capability registry keys operation tables on exactly that type. Equality
/// and ordering on the handle itself are identity-based (pointer compare) -
/// semantic comparison of host objects always goes through the `ordered`
/// capability.
#[derive(Clone)]
pub struct HostRef {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl HostRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: core::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.value.as_ref().type_id()
    }

    /// Short name of the wrapped type (no module path).
    pub fn type_name(&self) -> &'static str {
        match self.type_name.rsplit("::").next() {
            Some(n) => n,
            None => self.type_name,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref().downcast_ref::<T>()
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef<{}>", self.type_name())
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Eq for HostRef {}

impl Ord for HostRef {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = Arc::as_ptr(&self.value) as *const ();
        let rhs = Arc::as_ptr(&other.value) as *const ();
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for HostRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// We cannot use serde_json::Value because queries run against host objects
// that are not JSON data. BTree keeps object members ordered for stable
// output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    // Json data types. serde will automatically map json to these variants.
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<Arc<str>, Value>>),

    // An arbitrary host object, queryable through registered capabilities.
    Opaque(HostRef),
}

static NULL: Value = Value::Null;

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s.as_ref()),
            Value::Array(a) => a.serialize(serializer),
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k.as_ref(), v)?;
                }
                map.end()
            }

            // display host objects as a placeholder string
            Value::Opaque(h) => serializer.serialize_str(&format!("<{}>", h.type_name())),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Bool(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(s.into()))
    }

    fn visit_string<E>(self, s: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(s.into()))
    }

    fn visit_seq<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
    where
        V: SeqAccess<'de>,
    {
        let mut arr = vec![];
        while let Some(v) = visitor.next_element()? {
            arr.push(v);
        }
        Ok(Value::from(arr))
    }

    fn visit_map<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
    where
        V: MapAccess<'de>,
    {
        let mut map: BTreeMap<Arc<str>, Value> = BTreeMap::new();
        while let Some((key, value)) = visitor.next_entry::<String, Value>()? {
            map.insert(key.into(), value);
        }
        Ok(Value::from(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}

impl Value {
    pub fn new_object() -> Value {
        Value::from(BTreeMap::new())
    }

    pub fn new_array() -> Value {
        Value::from(vec![])
    }

    pub fn from_json_str(json: &str) -> crate::Result<Value> {
        serde_json::from_str(json).map_err(|e| crate::Error::Type(e.to_string()))
    }

    pub fn to_json_str(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Type(e.to_string()))
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Opaque(_) => "host object",
        }
    }

    /// Truth value used by predicates and logical connectives.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Opaque(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> crate::Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(crate::Error::Type(format!(
                "expected bool, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn as_str(&self) -> crate::Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_ref()),
            _ => Err(crate::Error::Type(format!(
                "expected string, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn as_number(&self) -> crate::Result<&Number> {
        match self {
            Value::Number(n) => Ok(n),
            _ => Err(crate::Error::Type(format!(
                "expected number, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn as_array(&self) -> crate::Result<&Vec<Value>> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(crate::Error::Type(format!(
                "expected array, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn as_array_mut(&mut self) -> crate::Result<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Ok(Arc::make_mut(a)),
            _ => Err(crate::Error::Type(format!(
                "expected array, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn as_object(&self) -> crate::Result<&BTreeMap<Arc<str>, Value>> {
        match self {
            Value::Object(m) => Ok(m),
            _ => Err(crate::Error::Type(format!(
                "expected object, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn as_object_mut(&mut self) -> crate::Result<&mut BTreeMap<Arc<str>, Value>> {
        match self {
            Value::Object(m) => Ok(Arc::make_mut(m)),
            _ => Err(crate::Error::Type(format!(
                "expected object, got {}",
                self.kind_name()
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(m) => m.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(Arc::new(a))
    }
}

impl From<BTreeMap<Arc<str>, Value>> for Value {
    fn from(m: BTreeMap<Arc<str>, Value>) -> Self {
        Value::Object(Arc::new(m))
    }
}

impl From<HostRef> for Value {
    fn from(h: HostRef) -> Self {
        Value::Opaque(h)
    }
}

impl ops::Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        match self.as_array() {
            Ok(a) if index < a.len() => &a[index],
            _ => &NULL,
        }
    }
}

impl ops::Index<&str> for Value {
    type Output = Value;

    fn index(&self, key: &str) -> &Self::Output {
        match self.get(key) {
            Some(v) => v,
            _ => &NULL,
        }
    }
}
