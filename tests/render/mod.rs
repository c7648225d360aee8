// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::unstable::*;
use filtrus::{Dialect, Engine, Error, HostRef, Replacements, Value};

fn compile(dialect: Dialect, text: &str) -> Result<ExprRef> {
    let engine = Engine::new();
    let query = engine.compile(dialect, text, Replacements::None)?;
    Ok(query.root().clone())
}

const QUERIES: &[&str] = &[
    "5 + 5 * 2",
    "(5 + 5) * 2",
    "10 - 2 - 3",
    "-x + 1",
    "not a == b",
    "not (a or b)",
    "a and b or c",
    "a and (b or c)",
    "name == \"O's\" or age != 3",
    "x not in [1, 2, 3]",
    "x in (1, 2, 3)",
    "name =~ 'b.b'",
    "users[0].name",
    "users.name",
    "take(2, users)",
    "f(1, 2).g",
    "filter(users, age > 10)",
    "map(users, bind(\"a\": age))",
    "sort(users, age)",
    "rsort(users, age)",
    "any(users)",
    "any(users, age > 10)",
    "each(users, age > 10)",
    "let(x = 5, y = 10) x + y",
    "if a > 2 then 'x' else 'y'",
    "if a then 1 else if b then 2 else 3",
    "if a then 1",
    "SELECT name FROM users WHERE age > 10",
    "SELECT * FROM users WHERE age > 10 ORDER BY age DESC",
    "SELECT name AS n, age FROM users ORDER BY age LIMIT 2 OFFSET 1",
    "ANY FROM users WHERE age > 10",
];

#[test]
fn sql_round_trips() -> Result<()> {
    for text in QUERIES {
        let tree = compile(Dialect::Sql, text)?;
        let rendered = render_ok(&tree, Dialect::Sql)?;
        let again = compile(Dialect::Sql, &rendered)?;
        assert!(
            tree.deep_eq(&again),
            "{text:?} -> {rendered:?} changed shape"
        );
    }
    Ok(())
}

#[test]
fn lisp_round_trips() -> Result<()> {
    for text in QUERIES {
        let tree = compile(Dialect::Sql, text)?;
        let rendered = render_ok(&tree, Dialect::Lisp)?;
        let again = compile(Dialect::Lisp, &rendered)?;
        assert!(
            tree.deep_eq(&again),
            "{text:?} -> {rendered:?} changed shape"
        );
    }
    Ok(())
}

pub fn render_ok(tree: &ExprRef, dialect: Dialect) -> Result<String> {
    Ok(filtrus::render(tree, dialect)?)
}

#[test]
fn select_normalizes_to_pseudo_functions() -> Result<()> {
    let tree = compile(Dialect::Sql, "SELECT * FROM users WHERE age > 10")?;
    let rendered = filtrus::render(&tree, Dialect::Sql)?;
    assert_eq!(rendered, "filter(users, age > 10)");
    Ok(())
}

#[test]
fn precedence_needs_no_spurious_parens() -> Result<()> {
    let tree = compile(Dialect::Sql, "1 + 2 * 3")?;
    assert_eq!(filtrus::render(&tree, Dialect::Sql)?, "1 + 2 * 3");

    let tree = compile(Dialect::Sql, "(1 + 2) * 3")?;
    assert_eq!(filtrus::render(&tree, Dialect::Sql)?, "(1 + 2) * 3");
    Ok(())
}

#[test]
fn lisp_output_shape() -> Result<()> {
    let tree = compile(Dialect::Sql, "age > 10 and name == 'Bob'")?;
    assert_eq!(
        filtrus::render(&tree, Dialect::Lisp)?,
        r#"(& (> (var age) 10) (== (var name) "Bob"))"#
    );
    Ok(())
}

#[test]
fn string_literals_render_escaped() -> Result<()> {
    let engine = Engine::new();
    let query = engine.compile(
        Dialect::Sql,
        "name == ?",
        Replacements::positional(vec![Value::from("say \"hi\"\n")]),
    )?;
    let rendered = query.render(Dialect::Sql)?;
    assert_eq!(rendered, "name == \"say \\\"hi\\\"\\n\"");
    Ok(())
}

#[test]
fn host_literals_are_unrenderable() -> Result<()> {
    struct Widget;

    let source = Source::from_contents("synth".to_string(), "x".to_string())?;
    let span = Span {
        source,
        line: 1,
        col: 1,
        start: 0,
        end: 1,
    };
    let tree = Ref::new(Expr::Literal {
        span,
        value: Value::Opaque(HostRef::new(Widget)),
    });

    let err = match filtrus::render(&tree, Dialect::Sql) {
        Err(e) => e,
        Ok(s) => anyhow::bail!("expected failure, got {s:?}"),
    };
    assert!(matches!(
        err,
        Error::Unrenderable {
            dialect: Dialect::Sql,
            kind: "literal"
        }
    ));
    Ok(())
}

#[test]
fn cross_dialect_translation_evaluates_identically() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_var(
        "users",
        Value::from_json_str(r#"[{"age": 10, "name": "Bob"}, {"age": 20, "name": "Alice"}]"#)?,
    );

    let sql = engine.compile(
        Dialect::Sql,
        "SELECT name FROM users WHERE age > 10",
        Replacements::None,
    )?;
    let translated = sql.render(Dialect::Lisp)?;
    let lisp = engine.compile(Dialect::Lisp, &translated, Replacements::None)?;
    assert_eq!(engine.eval(&sql)?, engine.eval(&lisp)?);
    Ok(())
}
