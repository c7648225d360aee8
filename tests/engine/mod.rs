// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::{Dialect, Engine, Error, Replacements, Value};

#[test]
fn compiled_queries_are_reusable_across_bindings() -> Result<()> {
    let engine = Engine::new();
    let query = engine.compile(Dialect::Sql, "age > 18", Replacements::None)?;

    let adult = Value::from_json_str(r#"{"age": 20}"#)?;
    let minor = Value::from_json_str(r#"{"age": 10}"#)?;
    assert!(engine.matches(&query, &adult)?);
    assert!(!engine.matches(&query, &minor)?);

    // A run-time failure must not poison the compiled query.
    let broken = Value::from_json_str(r#"{"age": "unknown"}"#)?;
    assert!(engine.matches(&query, &broken).is_err());
    assert!(engine.matches(&query, &adult)?);
    Ok(())
}

#[test]
fn compiling_twice_solves_identically() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_var(
        "users",
        Value::from_json_str(r#"[{"age": 10}, {"age": 30}]"#)?,
    );

    let text = "SELECT * FROM users WHERE age > 20";
    let a = engine.compile(Dialect::Sql, text, Replacements::None)?;
    let b = engine.compile(Dialect::Sql, text, Replacements::None)?;
    assert!(a.root().deep_eq(b.root()));
    assert_eq!(engine.eval(&a)?, engine.eval(&b)?);
    Ok(())
}

#[test]
fn replacement_values_never_parse_as_syntax() -> Result<()> {
    let mut engine = Engine::new();

    // Field values chosen to look like query fragments.
    let hostile = "Bob' OR '1' == '1";
    engine.set_var(
        "users",
        Value::from(vec![
            Value::from_json_str(r#"{"name": "Bob"}"#)?,
            Value::from_json_str(&format!(r#"{{"name": "{}"}}"#, "Bob' OR '1' == '1"))?,
        ]),
    );

    for value in [hostile, "1 == 1", "x\" or true", "select * from users"] {
        let query = engine.compile(
            Dialect::Sql,
            "SELECT * FROM users WHERE name == ?",
            Replacements::positional(vec![Value::from(value)]),
        )?;
        let result = engine.eval(&query)?;
        let rows = result.as_array()?;

        // Only records whose field equals the value exactly may match.
        for row in rows {
            assert_eq!(row["name"], Value::from(value));
        }
        if value == hostile {
            assert_eq!(rows.len(), 1);
        } else {
            assert_eq!(rows.len(), 0, "{value:?} matched spuriously");
        }
    }
    Ok(())
}

#[test]
fn rendered_replacements_stay_literal() -> Result<()> {
    let engine = Engine::new();
    let query = engine.compile(
        Dialect::Sql,
        "name == ?",
        Replacements::positional(vec![Value::from("x' OR 'a' == 'a")]),
    )?;

    // Render and reparse: still one literal comparison, not new syntax.
    let rendered = query.render(Dialect::Sql)?;
    let again = engine.compile(Dialect::Sql, &rendered, Replacements::None)?;
    assert!(query.root().deep_eq(again.root()));
    Ok(())
}

#[test]
fn named_replacements_filter_rows() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_var(
        "users",
        Value::from_json_str(r#"[{"age": 15}, {"age": 25}, {"age": 35}]"#)?,
    );

    let result = engine.apply_with(
        Dialect::Sql,
        "SELECT * FROM users WHERE age > {min} and age < {max}",
        Replacements::named([("min", Value::from(20i64)), ("max", Value::from(30i64))]),
    )?;
    assert_eq!(result, Value::from_json_str(r#"[{"age": 25}]"#)?);
    Ok(())
}

#[test]
fn search_yields_matching_rows() -> Result<()> {
    let engine = Engine::new();
    let rows = vec![
        Value::from_json_str(r#"{"age": 10, "name": "Bob"}"#)?,
        Value::from_json_str(r#"{"age": 20, "name": "Alice"}"#)?,
        Value::from_json_str(r#"{"age": 30, "name": "Eve"}"#)?,
    ];

    let query = engine.compile(Dialect::Sql, "age > 10", Replacements::None)?;
    let hits = engine.search(&query, &rows)?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["name"], Value::from("Alice"));
    assert_eq!(hits[1]["name"], Value::from("Eve"));
    Ok(())
}

#[test]
fn user_functions_are_callable() -> Result<()> {
    let mut engine = Engine::new();
    engine.register_function("double", |args| {
        let n = args[0].as_number()?;
        Ok(Value::from(n.as_f64() * 2.0))
    });
    assert_eq!(engine.apply("double(21)")?, Value::from(42i64));
    Ok(())
}

#[test]
fn engine_vars_shadow_the_standard_library() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_var("count", Value::from(7i64));
    assert_eq!(engine.apply("count + 1")?, Value::from(8i64));
    Ok(())
}

#[cfg(feature = "io")]
mod io {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> Result<std::path::PathBuf> {
        let mut path = std::env::temp_dir();
        path.push(format!("filtrus-test-{}-{name}", std::process::id()));
        let mut f = std::fs::File::create(&path)?;
        f.write_all(contents.as_bytes())?;
        Ok(path)
    }

    #[test]
    fn io_functions_are_gated() -> Result<()> {
        let engine = Engine::new();
        // Without the opt-in, csv is not even in scope.
        let err = engine.apply("count(csv('whatever.csv'))").unwrap_err();
        assert!(matches!(err, Error::Key(ref name) if name == "csv"), "{err}");
        Ok(())
    }

    #[test]
    fn csv_rows_stream_with_headers() -> Result<()> {
        let path = temp_file(
            "people.csv",
            "name,role\nBob,admin\nAlice,dev\nEve,dev\n",
        )?;
        let mut engine = Engine::new();
        engine.enable_io(true);

        let query = format!(
            "SELECT name FROM csv('{}', true) WHERE role == 'dev'",
            path.display()
        );
        assert_eq!(
            engine.apply(&query)?,
            Value::from_json_str(r#"[{"name": "Alice"}, {"name": "Eve"}]"#)?
        );

        // The handle restarts per evaluation.
        assert_eq!(
            engine.apply(&format!("count(csv('{}', true))", path.display()))?,
            Value::from(3i64)
        );
        std::fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn csv_without_headers_yields_arrays() -> Result<()> {
        let path = temp_file("bare.csv", "1,2\n3,4\n")?;
        let mut engine = Engine::new();
        engine.enable_io(true);

        let first = engine.apply(&format!("first(csv('{}'))", path.display()))?;
        assert_eq!(first, Value::from_json_str(r#"["1", "2"]"#)?);
        std::fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn lines_reads_a_text_file() -> Result<()> {
        let path = temp_file("notes.txt", "alpha\nbeta\ngamma\n")?;
        let mut engine = Engine::new();
        engine.enable_io(true);

        assert_eq!(
            engine.apply(&format!("count(lines('{}'))", path.display()))?,
            Value::from(3i64)
        );
        assert_eq!(
            engine.apply(&format!("first(lines('{}'))", path.display()))?,
            Value::from("alpha")
        );
        std::fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn missing_file_is_a_runtime_error() -> Result<()> {
        let mut engine = Engine::new();
        engine.enable_io(true);
        let err = engine
            .apply("count(csv('/nonexistent/filtrus.csv'))")
            .unwrap_err();
        assert!(matches!(err, Error::Type(_)), "{err}");
        Ok(())
    }
}
