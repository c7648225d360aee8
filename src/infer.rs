// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::value::Value;

use core::fmt;

/// Estimated result kind of an expression, propagated bottom-up without
/// evaluating anything. `Unknown` is the honest answer for anything that
/// depends on runtime bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Unknown,
    Null,
    Bool,
    Number,
    String,
    Collection,
    Row,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeKind::Unknown => "unknown",
            TypeKind::Null => "null",
            TypeKind::Bool => "bool",
            TypeKind::Number => "number",
            TypeKind::String => "string",
            TypeKind::Collection => "collection",
            TypeKind::Row => "row",
        })
    }
}

fn kind_of_value(value: &Value) -> TypeKind {
    match value {
        Value::Null => TypeKind::Null,
        Value::Bool(_) => TypeKind::Bool,
        Value::Number(_) => TypeKind::Number,
        Value::String(_) => TypeKind::String,
        Value::Array(_) => TypeKind::Collection,
        Value::Object(_) => TypeKind::Row,
        Value::Opaque(_) => TypeKind::Unknown,
    }
}

/// The advisory type-inference solver.
///
/// Estimates the kind of value `expr` evaluates to. Inference never fails
/// and never blocks evaluation; it exists to flag likely type errors
/// before an expensive real run (see [`lint`]).
pub fn infer(expr: &ExprRef) -> TypeKind {
    match expr.as_ref() {
        Expr::Literal { value, .. } => kind_of_value(value),
        Expr::Var { .. } => TypeKind::Unknown,
        Expr::Unary { op, .. } => match op {
            UnaryOp::Not => TypeKind::Bool,
            UnaryOp::Neg => TypeKind::Number,
        },
        Expr::Arith { op, lhs, rhs, .. } => {
            if *op == ArithOp::Add
                && infer(lhs) == TypeKind::String
                && infer(rhs) == TypeKind::String
            {
                TypeKind::String
            } else {
                TypeKind::Number
            }
        }
        Expr::Cmp { .. }
        | Expr::Membership { .. }
        | Expr::RegexMatch { .. }
        | Expr::Any { .. }
        | Expr::Each { .. } => TypeKind::Bool,
        // Connectives keep the deciding operand's value, so only a shared
        // operand kind is a safe estimate.
        Expr::Logic { lhs, rhs, .. } => {
            let (l, r) = (infer(lhs), infer(rhs));
            if l == r {
                l
            } else {
                TypeKind::Unknown
            }
        }
        Expr::Resolve { .. } | Expr::Index { .. } | Expr::Call { .. } => TypeKind::Unknown,
        Expr::Pair { .. } => TypeKind::Collection,
        Expr::List { .. } | Expr::Seq { .. } => TypeKind::Collection,
        Expr::Bind { .. } => TypeKind::Row,
        Expr::Map { .. } => TypeKind::Collection,
        Expr::Filter { source, .. } | Expr::Sort { source, .. } => infer(source),
        Expr::Let { body, .. } => infer(body),
        Expr::IfElse {
            conditions,
            default,
            ..
        } => {
            let mut kind = infer(default);
            for (_, value) in conditions {
                let k = infer(value);
                if k != kind {
                    kind = TypeKind::Unknown;
                }
            }
            kind
        }
    }
}

/// Walk the tree and report likely type errors as human-readable warnings.
/// Purely advisory: a warned query may still evaluate fine, and a clean
/// query may still fail at runtime.
pub fn lint(expr: &ExprRef) -> Vec<String> {
    let mut warnings = vec![];
    walk(expr, &mut warnings);
    warnings
}

fn warn(expr: &ExprRef, warnings: &mut Vec<String>, msg: String) {
    let span = expr.span();
    warnings.push(format!("{}:{}: {msg}", span.line, span.col));
}

fn ordered_kind(kind: TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::Unknown | TypeKind::Number | TypeKind::String | TypeKind::Bool
    )
}

fn walk(expr: &ExprRef, warnings: &mut Vec<String>) {
    match expr.as_ref() {
        Expr::Cmp { op, lhs, rhs, .. } => {
            let (l, r) = (infer(lhs), infer(rhs));
            if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                if !ordered_kind(l) {
                    warn(expr, warnings, format!("ordering is not defined for {l}"));
                }
                if !ordered_kind(r) {
                    warn(expr, warnings, format!("ordering is not defined for {r}"));
                }
                if l != TypeKind::Unknown && r != TypeKind::Unknown && l != r {
                    warn(expr, warnings, format!("comparing {l} with {r}"));
                }
            }
        }
        Expr::Arith { op, lhs, rhs, .. } => {
            let (l, r) = (infer(lhs), infer(rhs));
            let string_concat =
                *op == ArithOp::Add && l == TypeKind::String && r == TypeKind::String;
            if !string_concat {
                for k in [l, r] {
                    if !matches!(k, TypeKind::Unknown | TypeKind::Number) {
                        warn(expr, warnings, format!("arithmetic on {k}"));
                    }
                }
            }
        }
        Expr::Membership { collection, .. } => {
            let k = infer(collection);
            if !matches!(
                k,
                TypeKind::Unknown | TypeKind::Collection | TypeKind::String
            ) {
                warn(expr, warnings, format!("membership test against {k}"));
            }
        }
        Expr::Sort { key, .. } => {
            let k = infer(key);
            if !ordered_kind(k) {
                warn(expr, warnings, format!("sorting by a {k} key"));
            }
        }
        _ => (),
    }

    for child in children(expr) {
        walk(child, warnings);
    }
}

fn children(expr: &ExprRef) -> Vec<&ExprRef> {
    match expr.as_ref() {
        Expr::Literal { .. } | Expr::Var { .. } => vec![],
        Expr::Unary { expr, .. } => vec![expr],
        Expr::Arith { lhs, rhs, .. }
        | Expr::Cmp { lhs, rhs, .. }
        | Expr::Logic { lhs, rhs, .. } => vec![lhs, rhs],
        Expr::Membership {
            element,
            collection,
            ..
        } => vec![element, collection],
        Expr::RegexMatch { value, pattern, .. } => vec![value, pattern],
        Expr::Resolve { obj, .. } => vec![obj],
        Expr::Index { obj, index, .. } => vec![obj, index],
        Expr::Call { func, args, .. } => {
            let mut v = vec![func];
            v.extend(args.iter());
            v
        }
        Expr::Pair { key, value, .. } => vec![key, value],
        Expr::List { items, .. } | Expr::Seq { items, .. } => items.iter().collect(),
        Expr::Bind { pairs, .. } => pairs.iter().collect(),
        Expr::Map { source, expr, .. } => vec![source, expr],
        Expr::Filter {
            source, predicate, ..
        } => vec![source, predicate],
        Expr::Sort { source, key, .. } => vec![source, key],
        Expr::Any {
            source, predicate, ..
        } => {
            let mut v = vec![source];
            if let Some(p) = predicate {
                v.push(p);
            }
            v
        }
        Expr::Each {
            source, predicate, ..
        } => vec![source, predicate],
        Expr::Let { bindings, body, .. } => vec![bindings, body],
        Expr::IfElse {
            conditions,
            default,
            ..
        } => {
            let mut v = vec![];
            for (cond, value) in conditions {
                v.push(cond);
                v.push(value);
            }
            v.push(default);
            v
        }
    }
}
