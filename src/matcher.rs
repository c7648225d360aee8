// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, ExprRef, LogicOp, UnaryOp};
use crate::errors::{Error, Result};
use crate::eval;
use crate::registry::CapabilityRegistry;
use crate::scope::ScopeStack;

/// The filter/match solver: decide whether `expr` admits the current
/// scope's bindings.
///
/// Semantically this is the truth value of the evaluation solver's result,
/// but it is invoked once per element over potentially large sources, so
/// logical connectives recurse here directly and never build intermediate
/// values. Projection-building nodes are not predicates; handing one to
/// this solver is an error rather than a silent default.
pub fn matches(expr: &ExprRef, scope: &ScopeStack, registry: &CapabilityRegistry) -> Result<bool> {
    match expr.as_ref() {
        Expr::Logic { op, lhs, rhs, .. } => match op {
            LogicOp::And => Ok(matches(lhs, scope, registry)? && matches(rhs, scope, registry)?),
            LogicOp::Or => Ok(matches(lhs, scope, registry)? || matches(rhs, scope, registry)?),
        },
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
            ..
        } => Ok(!matches(expr, scope, registry)?),
        Expr::IfElse {
            conditions,
            default,
            ..
        } => {
            for (cond, value) in conditions {
                if matches(cond, scope, registry)? {
                    return matches(value, scope, registry);
                }
            }
            matches(default, scope, registry)
        }
        node @ (Expr::Map { .. } | Expr::Bind { .. } | Expr::Sort { .. }) => {
            Err(Error::UnsupportedNode {
                solver: "match",
                kind: node.kind_name(),
            })
        }
        _ => Ok(eval::eval(expr, scope, registry)?.truthy()),
    }
}
