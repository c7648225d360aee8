// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::unstable::*;
use filtrus::{Dialect, Engine, Error, Replacements, Value};

fn parse(text: &str) -> Result<ExprRef> {
    let engine = Engine::new();
    let query = engine.compile(Dialect::Sql, text, Replacements::None)?;
    Ok(query.root().clone())
}

fn parse_err(text: &str) -> Error {
    let engine = Engine::new();
    match engine.compile(Dialect::Sql, text, Replacements::None) {
        Err(e) => e,
        Ok(_) => panic!("expected {text:?} to fail"),
    }
}

#[test]
fn precedence_climbing() -> Result<()> {
    // 2 + 3 * 4 must parse as 2 + (3 * 4).
    let root = parse("2 + 3 * 4")?;
    match root.as_ref() {
        Expr::Arith {
            op: ArithOp::Add,
            rhs,
            ..
        } => assert!(matches!(
            rhs.as_ref(),
            Expr::Arith {
                op: ArithOp::Mul,
                ..
            }
        )),
        other => panic!("unexpected tree: {other:?}"),
    }

    // Parens override.
    let root = parse("(2 + 3) * 4")?;
    assert!(matches!(
        root.as_ref(),
        Expr::Arith {
            op: ArithOp::Mul,
            ..
        }
    ));
    Ok(())
}

#[test]
fn left_associativity() -> Result<()> {
    // 10 - 2 - 3 is (10 - 2) - 3.
    let root = parse("10 - 2 - 3")?;
    match root.as_ref() {
        Expr::Arith {
            op: ArithOp::Sub,
            lhs,
            ..
        } => assert!(matches!(
            lhs.as_ref(),
            Expr::Arith {
                op: ArithOp::Sub,
                ..
            }
        )),
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn not_binds_between_and_and_comparisons() -> Result<()> {
    // not a == b is not (a == b).
    let root = parse("not a == b")?;
    match root.as_ref() {
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
            ..
        } => assert!(matches!(expr.as_ref(), Expr::Cmp { op: CmpOp::Eq, .. })),
        other => panic!("unexpected tree: {other:?}"),
    }

    // a and not b keeps the not inside the and.
    let root = parse("a and not b")?;
    assert!(matches!(
        root.as_ref(),
        Expr::Logic {
            op: LogicOp::And,
            ..
        }
    ));
    Ok(())
}

#[test]
fn dot_and_subscript_chain() -> Result<()> {
    let root = parse("users[0].name")?;
    match root.as_ref() {
        Expr::Resolve { obj, member, .. } => {
            assert_eq!(member.1.as_ref(), "name");
            assert!(matches!(obj.as_ref(), Expr::Index { .. }));
        }
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn select_desugars_to_map_filter() -> Result<()> {
    let root = parse("SELECT name FROM users WHERE age > 10")?;
    match root.as_ref() {
        Expr::Map { source, expr, .. } => {
            assert!(matches!(source.as_ref(), Expr::Filter { .. }));
            match expr.as_ref() {
                Expr::Bind { pairs, .. } => assert_eq!(pairs.len(), 1),
                other => panic!("expected bind, got {other:?}"),
            }
        }
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn select_star_keeps_source_shape() -> Result<()> {
    let root = parse("SELECT * FROM users WHERE age > 10 ORDER BY age DESC")?;
    match root.as_ref() {
        Expr::Sort {
            source, descending, ..
        } => {
            assert!(*descending);
            assert!(matches!(source.as_ref(), Expr::Filter { .. }));
        }
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn limit_offset_desugar_to_take_drop() -> Result<()> {
    let root = parse("SELECT * FROM users LIMIT 2 OFFSET 1")?;
    match root.as_ref() {
        Expr::Call { func, args, .. } => {
            assert!(
                matches!(func.as_ref(), Expr::Var { name, .. } if name.as_ref() == "take")
            );
            assert!(
                matches!(args[1].as_ref(), Expr::Call { func, .. }
                    if matches!(func.as_ref(), Expr::Var { name, .. } if name.as_ref() == "drop"))
            );
        }
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn select_any_forms() -> Result<()> {
    for text in [
        "SELECT ANY FROM users WHERE age > 10",
        "ANY FROM users WHERE age > 10",
        "ANY users WHERE age > 10",
    ] {
        let root = parse(text)?;
        assert!(
            matches!(root.as_ref(), Expr::Any { predicate: Some(_), .. }),
            "{text}"
        );
    }
    // any( is the builtin, not the SQL form.
    let root = parse("any(users, age > 10)")?;
    assert!(matches!(root.as_ref(), Expr::Any { .. }));
    Ok(())
}

#[test]
fn sql_keywords_rejected_outside_select() {
    for text in ["from", "where x", "1 + limit"] {
        let err = parse_err(text);
        assert!(
            err.to_string().contains("SELECT"),
            "{text}: unexpected error {err}"
        );
    }
}

#[test]
fn order_after_any_rejected() {
    let err = parse_err("ANY users ORDER BY age");
    assert!(err.to_string().contains("ORDER BY"));
}

#[test]
fn duplicate_as_name_rejected() {
    let err = parse_err("SELECT age AS a, name AS a FROM users");
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn no_whitespace_before_call_paren() {
    let err = parse_err("count (users)");
    assert!(err.to_string().contains("whitespace"));
}

#[test]
fn syntax_error_carries_position() {
    match parse_err("1 +\n  *") {
        Error::Syntax { line, col, message } => {
            assert_eq!(line, 2);
            assert_eq!(col, 3);
            assert!(message.contains("^"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn trailing_tokens_rejected() {
    let err = parse_err("1 2");
    assert!(err.to_string().contains("operator"));
}

#[test]
fn positional_replacements_become_literals() -> Result<()> {
    let engine = Engine::new();
    let query = engine.compile(
        Dialect::Sql,
        "name == ?",
        Replacements::positional(vec![Value::from("Bob")]),
    )?;
    match query.root().as_ref() {
        Expr::Cmp { rhs, .. } => match rhs.as_ref() {
            Expr::Literal { value, .. } => assert_eq!(value, &Value::from("Bob")),
            other => panic!("expected literal, got {other:?}"),
        },
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn named_replacements() -> Result<()> {
    let engine = Engine::new();
    let query = engine.compile(
        Dialect::Sql,
        "age > {min} and age < {max}",
        Replacements::named([("min", Value::from(10i64)), ("max", Value::from(30i64))]),
    )?;
    assert!(query.unused_replacements().is_empty());
    Ok(())
}

#[test]
fn unbound_replacement_is_a_compile_error() {
    let engine = Engine::new();
    let err = match engine.compile(Dialect::Sql, "age > ?", Replacements::None) {
        Err(e) => e,
        Ok(_) => panic!("expected failure"),
    };
    assert!(matches!(err, Error::UnboundReplacement { .. }));
}

#[test]
fn over_supplied_replacements_are_reported_not_fatal() -> Result<()> {
    let engine = Engine::new();
    let query = engine.compile(
        Dialect::Sql,
        "age > ?",
        Replacements::positional(vec![Value::from(10i64), Value::from(99i64)]),
    )?;
    assert_eq!(query.unused_replacements().to_vec(), vec!["1".to_string()]);
    let err = match query.ensure_replacements_used() {
        Err(e) => e,
        Ok(_) => panic!("expected failure"),
    };
    assert!(matches!(err, Error::UnusedReplacement { count: 1, .. }));
    Ok(())
}

#[test]
fn let_and_if_parse() -> Result<()> {
    assert!(matches!(
        parse("let(x = 5, y = 10) x + y")?.as_ref(),
        Expr::Let { .. }
    ));
    assert!(matches!(
        parse("if a > 1 then 'x' else if a > 0 then 'y' else 'z'")?.as_ref(),
        Expr::IfElse { conditions, .. } if conditions.len() == 2
    ));
    Ok(())
}

#[test]
fn repeated_group_and_list() -> Result<()> {
    assert!(matches!(
        parse("(1, 2, 3)")?.as_ref(),
        Expr::Seq { items, .. } if items.len() == 3
    ));
    assert!(matches!(
        parse("[1, 'two', true]")?.as_ref(),
        Expr::List { items, .. } if items.len() == 3
    ));
    // A parenthesized single expression is just that expression.
    assert!(matches!(parse("(1)")?.as_ref(), Expr::Literal { .. }));
    Ok(())
}

#[test]
fn not_in_membership() -> Result<()> {
    let root = parse("x not in [1, 2]")?;
    match root.as_ref() {
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
            ..
        } => assert!(matches!(expr.as_ref(), Expr::Membership { .. })),
        other => panic!("unexpected tree: {other:?}"),
    }
    Ok(())
}

#[test]
fn keywords_are_case_insensitive() -> Result<()> {
    let a = parse("select name from users where age > 10")?;
    let b = parse("SELECT name FROM users WHERE age > 10")?;
    assert!(a.deep_eq(&b));
    Ok(())
}
