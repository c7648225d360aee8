// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::errors::{Error, Result};
use crate::matcher;
use crate::number::Number;
use crate::registry::{Capability, CapabilityRegistry};
use crate::scope::ScopeStack;
use crate::value::Value;

use core::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use regex::RegexBuilder;

type ValueIter = Box<dyn Iterator<Item = Result<Value>>>;

/// The evaluation solver: compute the value of `expr` under `scope`.
///
/// This is the canonical implementation of the tree's behavior. The solver
/// is a stateless function of (node, environment, registry); the same
/// compiled tree can be evaluated concurrently with different scopes.
pub fn eval(expr: &ExprRef, scope: &ScopeStack, registry: &CapabilityRegistry) -> Result<Value> {
    match expr.as_ref() {
        Expr::Literal { value, .. } => Ok(value.clone()),

        Expr::Var { name, .. } => scope.resolve(name, registry),

        Expr::Unary { op, expr, .. } => match op {
            UnaryOp::Not => Ok(Value::Bool(!eval(expr, scope, registry)?.truthy())),
            UnaryOp::Neg => {
                let v = eval(expr, scope, registry)?;
                Ok(Value::Number(to_number(&v, registry)?.neg()))
            }
        },

        Expr::Arith { op, lhs, rhs, .. } => {
            let a = eval(lhs, scope, registry)?;
            let b = eval(rhs, scope, registry)?;
            arith(*op, &a, &b, registry)
        }

        Expr::Cmp { op, lhs, rhs, .. } => {
            let a = eval(lhs, scope, registry)?;
            let b = eval(rhs, scope, registry)?;
            compare(*op, &a, &b, registry)
        }

        // Logical connectives short-circuit left to right and keep the
        // value of the deciding subexpression, the way dynamic languages
        // do; a miss is always plain `false`.
        Expr::Logic { op, lhs, rhs, .. } => {
            let a = eval(lhs, scope, registry)?;
            match op {
                LogicOp::And => {
                    if !a.truthy() {
                        return Ok(Value::Bool(false));
                    }
                    let b = eval(rhs, scope, registry)?;
                    if b.truthy() {
                        Ok(b)
                    } else {
                        Ok(Value::Bool(false))
                    }
                }
                LogicOp::Or => {
                    if a.truthy() {
                        return Ok(a);
                    }
                    let b = eval(rhs, scope, registry)?;
                    if b.truthy() {
                        Ok(b)
                    } else {
                        Ok(Value::Bool(false))
                    }
                }
            }
        }

        Expr::Membership {
            element,
            collection,
            ..
        } => {
            let needle = eval(element, scope, registry)?;
            let haystack = eval(collection, scope, registry)?;
            membership(&needle, &haystack, registry)
        }

        Expr::RegexMatch { value, pattern, .. } => {
            let pattern = eval(pattern, scope, registry)?;
            let re = RegexBuilder::new(pattern.as_str()?)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Type(format!("invalid regex: {e}")))?;
            let v = eval(value, scope, registry)?;
            match &v {
                Value::String(s) => Ok(Value::Bool(re.is_match(s))),
                Value::Number(n) => Ok(Value::Bool(re.is_match(&n.to_string()))),
                // If any item in the array matches, the whole match holds.
                Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| match item {
                    Value::String(s) => re.is_match(s),
                    other => re.is_match(&other.to_string()),
                }))),
                other => Err(Error::Type(format!(
                    "cannot regex-match a {}",
                    other.kind_name()
                ))),
            }
        }

        Expr::Resolve { obj, member, .. } => {
            let target = eval(obj, scope, registry)?;
            resolve_member(&target, &member.1, registry)
        }

        Expr::Index { obj, index, .. } => {
            let target = eval(obj, scope, registry)?;
            let key = eval(index, scope, registry)?;
            select_key(&target, &key, registry)
        }

        Expr::Call { func, args, .. } => {
            let callee = eval(func, scope, registry)?;
            match &callee {
                Value::Opaque(host) => {
                    let ops = registry.applicative(host)?;
                    let args = args
                        .iter()
                        .map(|a| eval(a, scope, registry))
                        .collect::<Result<Vec<_>>>()?;
                    (ops.apply)(host, registry, &args)
                }
                other => Err(Error::Type(format!(
                    "a {} is not callable",
                    other.kind_name()
                ))),
            }
        }

        Expr::Pair { key, value, .. } => {
            let k = eval(key, scope, registry)?;
            let v = eval(value, scope, registry)?;
            Ok(Value::from(vec![k, v]))
        }

        Expr::List { items, .. } | Expr::Seq { items, .. } => {
            let values = items
                .iter()
                .map(|item| eval(item, scope, registry))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::from(values))
        }

        Expr::Bind { pairs, .. } => eval_bind(pairs, scope, registry),

        Expr::Map { source, expr, .. } => {
            let src = eval(source, scope, registry)?;
            let mut out = vec![];
            for item in to_seq(src, registry)? {
                let nested = nest_scope(scope, item?)?;
                out.push(eval(expr, &nested, registry)?);
            }
            Ok(Value::from(out))
        }

        Expr::Filter {
            source, predicate, ..
        } => {
            let src = eval(source, scope, registry)?;
            let mut out = vec![];
            for item in to_seq(src, registry)? {
                let item = item?;
                let nested = nest_scope(scope, item.clone())?;
                if matcher::matches(predicate, &nested, registry)? {
                    out.push(item);
                }
            }
            Ok(Value::from(out))
        }

        Expr::Sort {
            source,
            key,
            descending,
            ..
        } => {
            let src = eval(source, scope, registry)?;
            let mut keyed = vec![];
            for item in to_seq(src, registry)? {
                let item = item?;
                let nested = nest_scope(scope, item.clone())?;
                keyed.push((eval(key, &nested, registry)?, item));
            }

            // The sort is stable, so ties keep source order in both
            // directions. An incomparable pair fails the whole sort.
            let mut failed: Option<Error> = None;
            keyed.sort_by(|a, b| {
                if failed.is_some() {
                    return Ordering::Equal;
                }
                match compare_values(&a.0, &b.0, registry) {
                    Ok(ord) if *descending => ord.reverse(),
                    Ok(ord) => ord,
                    Err(e) => {
                        failed = Some(e);
                        Ordering::Equal
                    }
                }
            });
            if let Some(e) = failed {
                return Err(e);
            }
            Ok(Value::from(
                keyed.into_iter().map(|(_, item)| item).collect::<Vec<_>>(),
            ))
        }

        Expr::Any {
            source, predicate, ..
        } => {
            let src = eval(source, scope, registry)?;
            for item in to_seq(src, registry)? {
                let item = item?;
                match predicate {
                    None => return Ok(Value::Bool(true)),
                    Some(p) => {
                        let nested = nest_scope(scope, item)?;
                        if matcher::matches(p, &nested, registry)? {
                            return Ok(Value::Bool(true));
                        }
                    }
                }
            }
            Ok(Value::Bool(false))
        }

        Expr::Each {
            source, predicate, ..
        } => {
            let src = eval(source, scope, registry)?;
            for item in to_seq(src, registry)? {
                let nested = nest_scope(scope, item?)?;
                if !matcher::matches(predicate, &nested, registry)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }

        Expr::Let { bindings, body, .. } => {
            let bound = eval(bindings, scope, registry)?;
            let nested = nest_scope(scope, bound)?;
            eval(body, &nested, registry)
        }

        Expr::IfElse {
            conditions,
            default,
            ..
        } => {
            for (cond, value) in conditions {
                if matcher::matches(cond, scope, registry)? {
                    return eval(value, scope, registry);
                }
            }
            eval(default, scope, registry)
        }
    }
}

fn eval_bind(
    pairs: &[ExprRef],
    scope: &ScopeStack,
    registry: &CapabilityRegistry,
) -> Result<Value> {
    let mut row: BTreeMap<Arc<str>, Value> = BTreeMap::new();
    for pair in pairs {
        match pair.as_ref() {
            Expr::Pair { key, value, .. } => {
                let key = eval(key, scope, registry)?;
                let key: Arc<str> = match &key {
                    Value::String(s) => s.clone(),
                    other => {
                        return Err(Error::Type(format!(
                            "binding names must be strings, got {}",
                            other.kind_name()
                        )))
                    }
                };
                row.insert(key, eval(value, scope, registry)?);
            }
            other => {
                return Err(Error::Type(format!(
                    "bind expects pairs, got a {} node",
                    other.kind_name()
                )))
            }
        }
    }
    Ok(Value::from(row))
}

struct ArcVecIter {
    items: Arc<Vec<Value>>,
    idx: usize,
}

impl Iterator for ArcVecIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.items.get(self.idx)?.clone();
        self.idx += 1;
        Some(Ok(v))
    }
}

/// View a value as a sequence of elements.
///
/// Arrays iterate; host objects with the `repeated` capability stream
/// lazily (the source is never materialized here); anything else is a
/// sequence of one.
pub(crate) fn to_seq(value: Value, registry: &CapabilityRegistry) -> Result<ValueIter> {
    match value {
        Value::Array(items) => Ok(Box::new(ArcVecIter { items, idx: 0 })),
        Value::Opaque(host) if registry.contains(Capability::Repeated, &host) => {
            let ops = registry.repeated(&host)?;
            Ok((ops.values)(&host)?)
        }
        other => Ok(Box::new(core::iter::once(Ok(other)))),
    }
}

/// Push `local` as the innermost scope layer for per-element evaluation.
/// Elements must be rows (objects) or structured-capable host objects.
fn nest_scope(scope: &ScopeStack, local: Value) -> Result<ScopeStack> {
    match &local {
        Value::Object(_) | Value::Opaque(_) => Ok(scope.nested(local)),
        other => Err(Error::Type(format!(
            "expected a structured row, got {}",
            other.kind_name()
        ))),
    }
}

pub(crate) fn to_number(value: &Value, registry: &CapabilityRegistry) -> Result<Number> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Opaque(host) => {
            let ops = registry.number(host)?;
            (ops.as_number)(host)
        }
        other => Err(Error::Type(format!(
            "expected number, got {}",
            other.kind_name()
        ))),
    }
}

fn arith(op: ArithOp, a: &Value, b: &Value, registry: &CapabilityRegistry) -> Result<Value> {
    if op == ArithOp::Add {
        if let (Value::String(x), Value::String(y)) = (a, b) {
            return Ok(Value::from(format!("{x}{y}")));
        }
    }

    let x = to_number(a, registry)?;
    let y = to_number(b, registry)?;
    let n = match op {
        ArithOp::Add => x.add(&y),
        ArithOp::Sub => x.sub(&y),
        ArithOp::Mul => x.mul(&y),
        ArithOp::Div => x
            .div(&y)
            .ok_or_else(|| Error::Type("division by zero".to_string()))?,
    };
    Ok(Value::Number(n))
}

fn compare(op: CmpOp, a: &Value, b: &Value, registry: &CapabilityRegistry) -> Result<Value> {
    match op {
        CmpOp::Eq => Ok(Value::Bool(values_equal(a, b, registry)?)),
        CmpOp::Ne => Ok(Value::Bool(!values_equal(a, b, registry)?)),
        _ => {
            // A null operand makes an ordering comparison false rather
            // than an error, so filters drop incomplete records.
            if a.is_null() || b.is_null() {
                return Ok(Value::Bool(false));
            }
            let ord = compare_values(a, b, registry)?;
            Ok(Value::Bool(match op {
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
                CmpOp::Eq | CmpOp::Ne => false,
            }))
        }
    }
}

/// Equality across values. Host objects dispatch through the `ordered`
/// capability of their type; a missing capability is an error, never a
/// silent false. Mismatched native kinds are simply unequal.
pub(crate) fn values_equal(a: &Value, b: &Value, registry: &CapabilityRegistry) -> Result<bool> {
    match (a, b) {
        (Value::Opaque(host), other) | (other, Value::Opaque(host)) => {
            let ops = registry.ordered(host)?;
            Ok((ops.cmp)(host, other)? == Ordering::Equal)
        }
        _ => Ok(a == b),
    }
}

/// Ordering across values, used by ordering comparisons and sorts.
/// Values of mismatched kinds (and nulls) do not order; the caller
/// receives a `Comparison` error rather than an arbitrary result.
pub(crate) fn compare_values(
    a: &Value,
    b: &Value,
    registry: &CapabilityRegistry,
) -> Result<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Opaque(host), other) => {
            let ops = registry.ordered(host)?;
            (ops.cmp)(host, other)
        }
        (other, Value::Opaque(host)) => {
            let ops = registry.ordered(host)?;
            Ok((ops.cmp)(host, other)?.reverse())
        }
        _ => Err(Error::Comparison {
            lhs: format!("{} ({})", a.kind_name(), a),
            rhs: format!("{} ({})", b.kind_name(), b),
        }),
    }
}

fn membership(needle: &Value, haystack: &Value, registry: &CapabilityRegistry) -> Result<Value> {
    match haystack {
        // "foo" in "foobar" is substring containment.
        Value::String(s) => match needle {
            Value::String(n) => Ok(Value::Bool(s.contains(n.as_ref()))),
            other => Err(Error::Type(format!(
                "cannot look for a {} inside a string",
                other.kind_name()
            ))),
        },
        Value::Array(items) => {
            for item in items.iter() {
                if values_equal(needle, item, registry)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Value::Opaque(host) if registry.contains(Capability::Repeated, host) => {
            let ops = registry.repeated(host)?;
            for item in (ops.values)(host)? {
                if values_equal(needle, &item?, registry)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        other => Err(Error::Type(format!(
            "cannot test membership in a {}",
            other.kind_name()
        ))),
    }
}

fn resolve_member(target: &Value, member: &str, registry: &CapabilityRegistry) -> Result<Value> {
    match target {
        Value::Object(map) => match map.get(member) {
            Some(v) => Ok(v.clone()),
            None => Err(Error::Key(member.to_string())),
        },
        Value::Opaque(host) => {
            if registry.contains(Capability::Structured, host) {
                let ops = registry.structured(host)?;
                return (ops.resolve)(host, member);
            }
            // A repeated host source resolves member-wise, like arrays.
            if registry.contains(Capability::Repeated, host) {
                let ops = registry.repeated(host)?;
                let mut out = vec![];
                for item in (ops.values)(host)? {
                    out.push(resolve_member(&item?, member, registry)?);
                }
                return Ok(Value::from(out));
            }
            Err(Error::UnsupportedCapability {
                capability: Capability::Structured,
                type_name: host.type_name().to_string(),
            })
        }
        // Resolving from a sequence maps over its elements.
        Value::Array(items) => {
            let mut out = vec![];
            for item in items.iter() {
                out.push(resolve_member(item, member, registry)?);
            }
            Ok(Value::from(out))
        }
        Value::Null => Err(Error::Type(format!(
            "cannot resolve member `{member}` of null"
        ))),
        other => Err(Error::Type(format!(
            "cannot resolve members of a {}",
            other.kind_name()
        ))),
    }
}

fn select_key(target: &Value, key: &Value, registry: &CapabilityRegistry) -> Result<Value> {
    match target {
        Value::Array(items) => {
            let idx = key.as_number()?.as_i64().ok_or_else(|| {
                Error::Type("array subscripts must be whole numbers".to_string())
            })?;
            let idx = usize::try_from(idx).map_err(|_| Error::Key(key.to_string()))?;
            match items.get(idx) {
                Some(v) => Ok(v.clone()),
                None => Err(Error::Key(key.to_string())),
            }
        }
        Value::Object(map) => match map.get(key.as_str()?) {
            Some(v) => Ok(v.clone()),
            None => Err(Error::Key(key.to_string())),
        },
        Value::Opaque(host) => {
            let ops = registry.associative(host)?;
            (ops.select)(host, key)
        }
        Value::Null => Err(Error::Type(format!("cannot select key {key} from null"))),
        other => Err(Error::Type(format!(
            "cannot select keys from a {}",
            other.kind_name()
        ))),
    }
}
