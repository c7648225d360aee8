// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::engine::Dialect;
use crate::errors::{Error, Result};
use crate::value::Value;

/// The render solver: re-emit a tree as surface text in `dialect`.
///
/// Composition is structural: a parent renders its operator or keyword and
/// joins recursively rendered children, inserting parentheses only where
/// the dialect's precedence demands them. Rendered text parses back to a
/// structurally equal tree, up to representational normalization (SELECT
/// sugar re-emits as the equivalent pseudo-function forms).
pub fn render(expr: &ExprRef, dialect: Dialect) -> Result<String> {
    match dialect {
        Dialect::Sql => sql(expr),
        Dialect::Lisp => lisp(expr),
    }
}

// Infix precedence of a node in the SQL dialect, mirroring the parser's
// table. Atom-shaped nodes have no precedence and never need wrapping.
fn sql_prec(expr: &ExprRef) -> Option<u8> {
    match expr.as_ref() {
        Expr::Logic {
            op: LogicOp::Or, ..
        } => Some(0),
        Expr::Logic {
            op: LogicOp::And, ..
        } => Some(1),
        Expr::Pair { .. } => Some(2),
        Expr::Cmp { .. } | Expr::Membership { .. } | Expr::RegexMatch { .. } => Some(3),
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
            ..
        } if matches!(expr.as_ref(), Expr::Membership { .. }) => Some(3),
        Expr::Arith {
            op: ArithOp::Add | ArithOp::Sub,
            ..
        } => Some(4),
        Expr::Arith {
            op: ArithOp::Mul | ArithOp::Div,
            ..
        } => Some(6),
        Expr::Resolve { .. } | Expr::Index { .. } => Some(12),
        _ => None,
    }
}

// Constructs that greedily consume the rest of the input when reparsed;
// they must be wrapped whenever they are an operand.
fn greedy(expr: &ExprRef) -> bool {
    matches!(expr.as_ref(), Expr::IfElse { .. } | Expr::Let { .. })
}

fn sql_operand(expr: &ExprRef, min_allowed: u8) -> Result<String> {
    let text = sql(expr)?;
    let wrap = greedy(expr)
        || match sql_prec(expr) {
            Some(p) => p < min_allowed,
            None => false,
        };
    if wrap {
        Ok(format!("({text})"))
    } else {
        Ok(text)
    }
}

fn sql_binary(
    lhs: &ExprRef,
    rhs: &ExprRef,
    prec: u8,
    op: &str,
    lspace: &str,
    rspace: &str,
) -> Result<String> {
    // Operators associate left: the left operand may share the operator's
    // precedence, the right operand must bind tighter.
    let left = sql_operand(lhs, prec)?;
    let right = sql_operand(rhs, prec + 1)?;
    Ok(format!("{left}{lspace}{op}{rspace}{right}"))
}

fn sql(expr: &ExprRef) -> Result<String> {
    match expr.as_ref() {
        Expr::Literal { value, .. } => sql_literal(value),

        Expr::Var { name, .. } => Ok(name.to_string()),

        Expr::Unary { op, expr, .. } => match op {
            UnaryOp::Not => {
                if let Expr::Membership {
                    element,
                    collection,
                    ..
                } = expr.as_ref()
                {
                    return sql_binary(element, collection, 3, "not in", " ", " ");
                }
                Ok(format!("not {}", sql_operand(expr, 3)?))
            }
            UnaryOp::Neg => Ok(format!("-{}", sql_operand(expr, 5)?)),
        },

        Expr::Arith { op, lhs, rhs, .. } => {
            let (name, prec) = match op {
                ArithOp::Add => ("+", 4),
                ArithOp::Sub => ("-", 4),
                ArithOp::Mul => ("*", 6),
                ArithOp::Div => ("/", 6),
            };
            sql_binary(lhs, rhs, prec, name, " ", " ")
        }

        Expr::Cmp { op, lhs, rhs, .. } => {
            let name = match op {
                CmpOp::Eq => "==",
                CmpOp::Ne => "!=",
                CmpOp::Lt => "<",
                CmpOp::Le => "<=",
                CmpOp::Gt => ">",
                CmpOp::Ge => ">=",
            };
            sql_binary(lhs, rhs, 3, name, " ", " ")
        }

        Expr::Logic { op, lhs, rhs, .. } => match op {
            LogicOp::And => sql_binary(lhs, rhs, 1, "and", " ", " "),
            LogicOp::Or => sql_binary(lhs, rhs, 0, "or", " ", " "),
        },

        Expr::Membership {
            element,
            collection,
            ..
        } => sql_binary(element, collection, 3, "in", " ", " "),

        Expr::RegexMatch { value, pattern, .. } => sql_binary(value, pattern, 3, "=~", " ", " "),

        Expr::Resolve { obj, member, .. } => {
            Ok(format!("{}.{}", sql_operand(obj, 12)?, member.1))
        }

        Expr::Index { obj, index, .. } => {
            Ok(format!("{}[{}]", sql_operand(obj, 12)?, sql(index)?))
        }

        Expr::Call { func, args, .. } => {
            let args = args.iter().map(sql).collect::<Result<Vec<_>>>()?;
            Ok(format!("{}({})", sql_operand(func, 12)?, args.join(", ")))
        }

        Expr::Pair { key, value, .. } => sql_binary(key, value, 2, ":", "", " "),

        Expr::List { items, .. } => {
            let items = items.iter().map(sql).collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }

        Expr::Seq { items, .. } => {
            let items = items.iter().map(sql).collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", items.join(", ")))
        }

        Expr::Bind { pairs, .. } => {
            let pairs = pairs.iter().map(sql).collect::<Result<Vec<_>>>()?;
            Ok(format!("bind({})", pairs.join(", ")))
        }

        Expr::Map { source, expr, .. } => Ok(format!("map({}, {})", sql(source)?, sql(expr)?)),

        Expr::Filter {
            source, predicate, ..
        } => Ok(format!("filter({}, {})", sql(source)?, sql(predicate)?)),

        Expr::Sort {
            source,
            key,
            descending,
            ..
        } => {
            let name = if *descending { "rsort" } else { "sort" };
            Ok(format!("{name}({}, {})", sql(source)?, sql(key)?))
        }

        Expr::Any {
            source, predicate, ..
        } => match predicate {
            Some(p) => Ok(format!("any({}, {})", sql(source)?, sql(p)?)),
            None => Ok(format!("any({})", sql(source)?)),
        },

        Expr::Each {
            source, predicate, ..
        } => Ok(format!("each({}, {})", sql(source)?, sql(predicate)?)),

        Expr::Let { bindings, body, .. } => {
            let pairs = match bindings.as_ref() {
                Expr::Bind { pairs, .. } => pairs,
                _ => {
                    return Err(Error::Unrenderable {
                        dialect: Dialect::Sql,
                        kind: "let",
                    })
                }
            };
            let mut rendered = vec![];
            for pair in pairs {
                match pair.as_ref() {
                    Expr::Pair { key, value, .. } => match key.as_ref() {
                        Expr::Literal {
                            value: Value::String(name),
                            ..
                        } => rendered.push(format!("{name} = {}", sql(value)?)),
                        _ => {
                            return Err(Error::Unrenderable {
                                dialect: Dialect::Sql,
                                kind: "let",
                            })
                        }
                    },
                    _ => {
                        return Err(Error::Unrenderable {
                            dialect: Dialect::Sql,
                            kind: "let",
                        })
                    }
                }
            }
            Ok(format!("let({}) {}", rendered.join(", "), sql(body)?))
        }

        Expr::IfElse {
            conditions,
            default,
            ..
        } => {
            let branches = conditions
                .iter()
                .map(|(cond, value)| Ok(format!("if {} then {}", sql(cond)?, sql(value)?)))
                .collect::<Result<Vec<_>>>()?;
            let mut out = branches.join(" else ");
            if !matches!(
                default.as_ref(),
                Expr::Literal {
                    value: Value::Null,
                    ..
                }
            ) {
                out.push_str(" else ");
                out.push_str(&sql(default)?);
            }
            Ok(out)
        }
    }
}

fn sql_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        // Strings go through the JSON escaper so a value containing
        // quotes or operators stays a single literal when reparsed.
        Value::String(s) => {
            serde_json::to_string(s.as_ref()).map_err(|e| Error::Type(e.to_string()))
        }
        Value::Array(items) => {
            let items = items.iter().map(sql_literal).collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Object(map) => {
            let mut pairs = vec![];
            for (k, v) in map.iter() {
                let key =
                    serde_json::to_string(k.as_ref()).map_err(|e| Error::Type(e.to_string()))?;
                pairs.push(format!("{key}: {}", sql_literal(v)?));
            }
            Ok(format!("bind({})", pairs.join(", ")))
        }
        Value::Opaque(_) => Err(Error::Unrenderable {
            dialect: Dialect::Sql,
            kind: "literal",
        }),
    }
}

fn lisp(expr: &ExprRef) -> Result<String> {
    match expr.as_ref() {
        Expr::Literal { value, .. } => lisp_literal(value),

        Expr::Var { name, .. } => Ok(format!("(var {name})")),

        Expr::Unary { op, expr, .. } => match op {
            UnaryOp::Not => Ok(format!("(! {})", lisp(expr)?)),
            UnaryOp::Neg => Ok(format!("(neg {})", lisp(expr)?)),
        },

        Expr::Arith { op, lhs, rhs, .. } => {
            let name = match op {
                ArithOp::Add => "+",
                ArithOp::Sub => "-",
                ArithOp::Mul => "*",
                ArithOp::Div => "/",
            };
            Ok(format!("({name} {} {})", lisp(lhs)?, lisp(rhs)?))
        }

        Expr::Cmp { op, lhs, rhs, .. } => {
            let name = match op {
                CmpOp::Eq => "==",
                CmpOp::Ne => "!=",
                CmpOp::Lt => "<",
                CmpOp::Le => "<=",
                CmpOp::Gt => ">",
                CmpOp::Ge => ">=",
            };
            Ok(format!("({name} {} {})", lisp(lhs)?, lisp(rhs)?))
        }

        Expr::Logic { op, lhs, rhs, .. } => {
            let name = match op {
                LogicOp::And => "&",
                LogicOp::Or => "|",
            };
            Ok(format!("({name} {} {})", lisp(lhs)?, lisp(rhs)?))
        }

        Expr::Membership {
            element,
            collection,
            ..
        } => Ok(format!("(in {} {})", lisp(element)?, lisp(collection)?)),

        Expr::RegexMatch { value, pattern, .. } => {
            Ok(format!("(=~ {} {})", lisp(value)?, lisp(pattern)?))
        }

        Expr::Resolve { obj, member, .. } => Ok(format!("(. {} {})", lisp(obj)?, member.1)),

        Expr::Index { obj, index, .. } => {
            Ok(format!("(select {} {})", lisp(obj)?, lisp(index)?))
        }

        Expr::Call { func, args, .. } => {
            let mut parts = vec![lisp(func)?];
            for arg in args {
                parts.push(lisp(arg)?);
            }
            Ok(format!("(apply {})", parts.join(" ")))
        }

        Expr::Pair { key, value, .. } => Ok(format!("(: {} {})", lisp(key)?, lisp(value)?)),

        Expr::List { items, .. } => {
            let items = items.iter().map(lisp).collect::<Result<Vec<_>>>()?;
            Ok(format!("(list {})", items.join(" ")))
        }

        Expr::Seq { items, .. } => {
            let items = items.iter().map(lisp).collect::<Result<Vec<_>>>()?;
            Ok(format!("(seq {})", items.join(" ")))
        }

        Expr::Bind { pairs, .. } => {
            let pairs = pairs.iter().map(lisp).collect::<Result<Vec<_>>>()?;
            Ok(format!("(bind {})", pairs.join(" ")))
        }

        Expr::Map { source, expr, .. } => Ok(format!("(map {} {})", lisp(source)?, lisp(expr)?)),

        Expr::Filter {
            source, predicate, ..
        } => Ok(format!("(filter {} {})", lisp(source)?, lisp(predicate)?)),

        Expr::Sort {
            source,
            key,
            descending,
            ..
        } => {
            let name = if *descending { "rsort" } else { "sort" };
            Ok(format!("({name} {} {})", lisp(source)?, lisp(key)?))
        }

        Expr::Any {
            source, predicate, ..
        } => match predicate {
            Some(p) => Ok(format!("(any {} {})", lisp(source)?, lisp(p)?)),
            None => Ok(format!("(any {})", lisp(source)?)),
        },

        Expr::Each {
            source, predicate, ..
        } => Ok(format!("(each {} {})", lisp(source)?, lisp(predicate)?)),

        Expr::Let { bindings, body, .. } => {
            Ok(format!("(let {} {})", lisp(bindings)?, lisp(body)?))
        }

        Expr::IfElse {
            conditions,
            default,
            ..
        } => {
            let mut parts = vec![];
            for (cond, value) in conditions {
                parts.push(lisp(cond)?);
                parts.push(lisp(value)?);
            }
            if !matches!(
                default.as_ref(),
                Expr::Literal {
                    value: Value::Null,
                    ..
                }
            ) {
                parts.push(lisp(default)?);
            }
            Ok(format!("(if {})", parts.join(" ")))
        }
    }
}

fn lisp_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => {
            serde_json::to_string(s.as_ref()).map_err(|e| Error::Type(e.to_string()))
        }
        Value::Array(items) => {
            let items = items.iter().map(lisp_literal).collect::<Result<Vec<_>>>()?;
            Ok(format!("(list {})", items.join(" ")))
        }
        Value::Object(map) => {
            let mut pairs = vec![];
            for (k, v) in map.iter() {
                let key =
                    serde_json::to_string(k.as_ref()).map_err(|e| Error::Type(e.to_string()))?;
                pairs.push(format!("(: {key} {})", lisp_literal(v)?));
            }
            Ok(format!("(bind {})", pairs.join(" ")))
        }
        Value::Opaque(_) => Err(Error::Unrenderable {
            dialect: Dialect::Lisp,
            kind: "literal",
        }),
    }
}
