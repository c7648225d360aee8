// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::unstable::*;
use filtrus::{Dialect, Engine, Replacements, Value};

fn parse(dialect: Dialect, text: &str) -> Result<ExprRef> {
    let engine = Engine::new();
    let query = engine.compile(dialect, text, Replacements::None)?;
    Ok(query.root().clone())
}

#[test]
fn both_dialects_build_the_same_tree() -> Result<()> {
    let cases = [
        ("5 + 5", "(+ 5 5)"),
        ("users.name", "(. (var users) name)"),
        ("a > 10 and b < 20", "(& (> (var a) 10) (< (var b) 20))"),
        ("x in [1, 2]", "(in (var x) (list 1 2))"),
        ("not x", "(! (var x))"),
        (
            "filter(users, age > 10)",
            "(filter (var users) (> (var age) 10))",
        ),
        (
            "sort(users, age)",
            "(sort (var users) (var age))",
        ),
        ("count(users)", "(apply (var count) (var users))"),
        ("name =~ 'b.b'", "(=~ (var name) \"b.b\")"),
        ("users[0]", "(select (var users) 0)"),
        (
            "if a then 1 else 2",
            "(if (var a) 1 2)",
        ),
    ];

    for (sql, lisp) in cases {
        let a = parse(Dialect::Sql, sql)?;
        let b = parse(Dialect::Lisp, lisp)?;
        assert!(a.deep_eq(&b), "{sql} != {lisp}\n{a:?}\n{b:?}");
    }
    Ok(())
}

#[test]
fn variadic_forms_fold_left() -> Result<()> {
    let a = parse(Dialect::Sql, "1 + 2 + 3")?;
    let b = parse(Dialect::Lisp, "(+ 1 2 3)")?;
    assert!(a.deep_eq(&b));
    Ok(())
}

#[test]
fn lisp_evaluates_like_sql() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_var(
        "users",
        Value::from_json_str(r#"[{"age": 10, "name": "Bob"}, {"age": 20, "name": "Alice"}]"#)?,
    );

    let result = engine.apply_with(
        Dialect::Lisp,
        "(map (filter (var users) (> (var age) 10)) (bind (: \"name\" (var name))))",
        Replacements::None,
    )?;
    assert_eq!(result, Value::from_json_str(r#"[{"name": "Alice"}]"#)?);
    Ok(())
}

#[test]
fn lisp_params_interpolate() -> Result<()> {
    let engine = Engine::new();
    let result = engine.apply_with(
        Dialect::Lisp,
        "(+ (param) (param 0))",
        Replacements::positional(vec![Value::from(21i64)]),
    )?;
    assert_eq!(result, Value::from(42i64));
    Ok(())
}

#[test]
fn bare_symbols_are_rejected() {
    let engine = Engine::new();
    let err = match engine.compile(Dialect::Lisp, "(+ x 1)", Replacements::None) {
        Err(e) => e,
        Ok(_) => panic!("expected failure"),
    };
    assert!(err.to_string().contains("var"));
}

#[test]
fn unknown_forms_are_rejected() {
    let engine = Engine::new();
    let err = match engine.compile(Dialect::Lisp, "(frobnicate 1 2)", Replacements::None) {
        Err(e) => e,
        Ok(_) => panic!("expected failure"),
    };
    assert!(err.to_string().contains("unknown form"));
}

#[test]
fn let_and_bind_forms() -> Result<()> {
    let engine = Engine::new();
    let result = engine.apply_with(
        Dialect::Lisp,
        "(let (bind (: \"x\" 5) (: \"y\" 10)) (+ (var x) (var y)))",
        Replacements::None,
    )?;
    assert_eq!(result, Value::from(15i64));
    Ok(())
}
