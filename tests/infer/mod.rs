// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::{Dialect, Engine, Replacements, TypeKind};

fn infer(text: &str) -> Result<TypeKind> {
    let engine = Engine::new();
    let query = engine.compile(Dialect::Sql, text, Replacements::None)?;
    Ok(query.infer())
}

fn lint(text: &str) -> Result<Vec<String>> {
    let engine = Engine::new();
    let query = engine.compile(Dialect::Sql, text, Replacements::None)?;
    Ok(query.lint())
}

#[test]
fn literal_and_operator_kinds() -> Result<()> {
    assert_eq!(infer("5 + 5")?, TypeKind::Number);
    assert_eq!(infer("'a' + 'b'")?, TypeKind::String);
    assert_eq!(infer("5 > 3")?, TypeKind::Bool);
    assert_eq!(infer("not x")?, TypeKind::Bool);
    assert_eq!(infer("x in [1]")?, TypeKind::Bool);
    assert_eq!(infer("'abc'")?, TypeKind::String);
    assert_eq!(infer("[1, 2]")?, TypeKind::Collection);
    assert_eq!(infer("bind('a': 1)")?, TypeKind::Row);
    Ok(())
}

#[test]
fn variables_are_unknown() -> Result<()> {
    assert_eq!(infer("x")?, TypeKind::Unknown);
    assert_eq!(infer("x.y")?, TypeKind::Unknown);
    assert_eq!(infer("f(1)")?, TypeKind::Unknown);
    Ok(())
}

#[test]
fn queries_are_collections() -> Result<()> {
    assert_eq!(
        infer("SELECT name FROM users WHERE age > 10")?,
        TypeKind::Collection
    );
    assert_eq!(infer("sort(filter(users, a), b)")?, TypeKind::Unknown);
    assert_eq!(infer("sort(filter([1], a), b)")?, TypeKind::Collection);
    assert_eq!(infer("ANY FROM users WHERE age > 1")?, TypeKind::Bool);
    Ok(())
}

#[test]
fn branch_kinds_unify() -> Result<()> {
    assert_eq!(infer("if x then 1 else 2")?, TypeKind::Number);
    assert_eq!(infer("if x then 1 else 'two'")?, TypeKind::Unknown);
    assert_eq!(infer("let(x = 5) 'y'")?, TypeKind::String);
    Ok(())
}

#[test]
fn lint_flags_likely_type_errors() -> Result<()> {
    // Comparing a collection with a number is almost certainly a bug.
    let warnings = lint("[1, 2] > 5")?;
    assert!(!warnings.is_empty());
    assert!(warnings[0].contains("collection"), "{warnings:?}");

    let warnings = lint("'a' * 3")?;
    assert!(!warnings.is_empty());

    let warnings = lint("x in 5")?;
    assert!(!warnings.is_empty());
    Ok(())
}

#[test]
fn lint_stays_quiet_for_plausible_queries() -> Result<()> {
    assert!(lint("age > 10 and name == 'Bob'")?.is_empty());
    assert!(lint("SELECT name FROM users WHERE age > 10")?.is_empty());
    assert!(lint("'a' + 'b'")?.is_empty());
    Ok(())
}

#[test]
fn lint_never_blocks_evaluation() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_var("x", filtrus::Value::from(7i64));
    // Lint-clean or not, the query still runs.
    let query = engine.compile(Dialect::Sql, "x + 1", Replacements::None)?;
    assert!(query.lint().is_empty());
    assert_eq!(engine.eval(&query)?, filtrus::Value::from(8i64));
    Ok(())
}
