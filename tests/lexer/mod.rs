// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use filtrus::unstable::*;

fn get_tokens(source: &Source) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut lex = Lexer::new(source);
    loop {
        let tok = lex.next_token()?;
        tokens.push(tok.clone());
        if tok.0 == TokenKind::Eof {
            break;
        }
    }
    Ok(tokens)
}

fn source(text: &str) -> Result<Source> {
    Ok(Source::from_contents("case.sql".to_string(), text.to_string())?)
}

#[test]
fn keywords_and_symbols() -> Result<()> {
    let src = source("select * from users where age >= 10")?;
    let tokens = get_tokens(&src)?;

    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.0.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident,
            TokenKind::Symbol,
            TokenKind::Ident,
            TokenKind::Ident,
            TokenKind::Ident,
            TokenKind::Ident,
            TokenKind::Ident,
            TokenKind::Symbol,
            TokenKind::Number,
            TokenKind::Eof,
        ]
    );
    assert_eq!(tokens[1].1.text(), "*");
    assert_eq!(tokens[7].1.text(), ">=");
    Ok(())
}

#[test]
fn multi_char_operators() -> Result<()> {
    let src = source("== != <= >= =~ = < > ! & |")?;
    let tokens = get_tokens(&src)?;
    let texts: Vec<&str> = tokens
        .iter()
        .take_while(|t| t.0 != TokenKind::Eof)
        .map(|t| t.1.text())
        .collect();
    assert_eq!(
        texts,
        vec!["==", "!=", "<=", ">=", "=~", "=", "<", ">", "!", "&", "|"]
    );
    Ok(())
}

#[test]
fn string_literals() -> Result<()> {
    let src = source(r#""hello" 'world' "say \"hi\"" 'a\nb'"#)?;
    let tokens = get_tokens(&src)?;

    assert_eq!(tokens[0].0, TokenKind::String);
    assert_eq!(tokens[0].1.text(), "hello");
    assert_eq!(tokens[1].1.text(), "world");
    assert_eq!(unescape(tokens[2].1.text()), "say \"hi\"");
    assert_eq!(unescape(tokens[3].1.text()), "a\nb");
    Ok(())
}

#[test]
fn escape_sequences() -> Result<()> {
    assert_eq!(unescape(r"caf\u00e9"), "café");
    assert_eq!(unescape(r"\t\r\n"), "\t\r\n");
    assert_eq!(unescape(r"\u0041"), "A");
    Ok(())
}

#[test]
fn param_tokens() -> Result<()> {
    let src = source("? {name} {3} {}")?;
    let tokens = get_tokens(&src)?;

    assert!(tokens[..4].iter().all(|t| t.0 == TokenKind::Param));
    assert_eq!(tokens[0].1.text(), "?");
    assert_eq!(tokens[1].1.text(), "name");
    assert_eq!(tokens[2].1.text(), "3");
    assert_eq!(tokens[3].1.text(), "");
    Ok(())
}

#[test]
fn numbers() -> Result<()> {
    let src = source("0 42 1.5 0.25 2e3 1e-2")?;
    let tokens = get_tokens(&src)?;
    assert!(tokens[..6].iter().all(|t| t.0 == TokenKind::Number));
    assert_eq!(tokens[2].1.text(), "1.5");
    Ok(())
}

#[test]
fn invalid_number() -> Result<()> {
    let src = source("12abc")?;
    let mut lex = Lexer::new(&src);
    assert!(lex.next_token().is_err());
    Ok(())
}

#[test]
fn unmatched_quote() -> Result<()> {
    let src = source("'no end")?;
    let mut lex = Lexer::new(&src);
    let err = match lex.next_token() {
        Err(e) => e,
        Ok(t) => anyhow::bail!("expected an error, got {t:?}"),
    };
    assert!(err.to_string().contains("unmatched"));
    Ok(())
}

#[test]
fn invalid_character() -> Result<()> {
    let src = source("5 @ 5")?;
    let mut lex = Lexer::new(&src);
    lex.next_token()?;
    assert!(lex.next_token().is_err());
    Ok(())
}

#[test]
fn positions_across_lines() -> Result<()> {
    let src = source("age\n  > 10")?;
    let tokens = get_tokens(&src)?;

    assert_eq!((tokens[0].1.line, tokens[0].1.col), (1, 1));
    assert_eq!((tokens[1].1.line, tokens[1].1.col), (2, 3));
    assert_eq!((tokens[2].1.line, tokens[2].1.col), (2, 5));
    Ok(())
}

#[test]
fn caret_message_points_at_token() -> Result<()> {
    let src = source("a ++ b")?;
    let msg = src.message(1, 3, "error", "boom");
    assert!(msg.contains("case.sql:1:3"));
    assert!(msg.contains("a ++ b"));
    assert!(msg.contains('^'));
    assert!(msg.contains("error: boom"));
    Ok(())
}
