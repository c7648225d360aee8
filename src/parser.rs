// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::errors::Result;
use crate::lexer::*;
use crate::number::Number;
use crate::params::ParamBinder;
use crate::value::Value;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

// Operator precedence, low to high. All infix operators associate left;
// prefix operators bind their operand at the listed level.
const PREC_OR: u8 = 0;
const PREC_AND: u8 = 1;
const PREC_PAIR: u8 = 2;
const PREC_CMP: u8 = 3;
const PREC_ADD: u8 = 4;
const PREC_NEG: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_POSTFIX: u8 = 12;

// SQL keywords that are only meaningful inside a SELECT expression. They
// are rejected as variable names so a misplaced keyword produces a clear
// error instead of matching as a symbol.
const SQL_RESERVED_KEYWORDS: [&str; 8] = [
    "from", "where", "asc", "desc", "limit", "offset", "as", "by",
];

#[derive(Clone, Copy, PartialEq)]
enum InfixKind {
    Logic(LogicOp),
    Cmp(CmpOp),
    Arith(ArithOp),
    In,
    NotIn,
    Match,
    Pair,
    Dot,
    Subscript,
}

/// Parser for the SQL-like dialect.
///
/// A recursive descent parser; infix expressions are handled by precedence
/// climbing. The parser performs no capability resolution or evaluation -
/// it is purely syntax to AST. Replacement parameters are resolved as they
/// are encountered, so an unbound placeholder is a compile-time error.
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    params: ParamBinder,
    aliases: Vec<HashMap<String, ExprRef>>,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source, params: ParamBinder) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            params,
            aliases: vec![],
        })
    }

    pub fn into_params(self) -> ParamBinder {
        self.params
    }

    pub fn parse(&mut self) -> Result<ExprRef> {
        let expr = self.expression(0)?;
        if self.tok.0 != TokenKind::Eof {
            let msg = format!(
                "unexpected `{}`. Were you looking for an operator?",
                self.tok.1.text()
            );
            return Err(self.tok.1.error(&msg));
        }
        Ok(expr)
    }

    // Token plumbing.

    fn next_token(&mut self) -> Result<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn peek_token(&mut self) -> Result<Token> {
        self.lexer.clone().next_token()
    }

    fn token_text(&self) -> &str {
        self.tok.1.text()
    }

    /// Lower-cased token text when the current token is an identifier.
    /// Keywords are case-insensitive.
    fn kw(&self) -> Option<String> {
        match self.tok.0 {
            TokenKind::Ident => Some(self.token_text().to_ascii_lowercase()),
            _ => None,
        }
    }

    fn at_kw(&self, kw: &str) -> bool {
        matches!(self.tok.0, TokenKind::Ident) && self.token_text().eq_ignore_ascii_case(kw)
    }

    fn accept_kw(&mut self, kw: &str) -> Result<bool> {
        if self.at_kw(kw) {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_kw(&mut self, kw: &str, context: &str) -> Result<()> {
        if self.at_kw(kw) {
            self.next_token()
        } else {
            let msg = format!("expecting `{kw}` {context}");
            Err(self.tok.1.error(&msg))
        }
    }

    fn at_symbol(&self, text: &str) -> bool {
        matches!(self.tok.0, TokenKind::Symbol) && self.token_text() == text
    }

    fn accept_symbol(&mut self, text: &str) -> Result<bool> {
        if self.at_symbol(text) {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_symbol(&mut self, text: &str, context: &str) -> Result<()> {
        if self.at_symbol(text) {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.tok.1.error(&msg))
        }
    }

    /// Matches `ORDER BY` (two identifier tokens) without consuming on a
    /// partial match.
    fn accept_order_by(&mut self) -> Result<bool> {
        if self.at_kw("order") {
            let next = self.peek_token()?;
            if next.0 == TokenKind::Ident && next.1.text().eq_ignore_ascii_case("by") {
                self.next_token()?;
                self.next_token()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn span_to(&self, start: &Span, end: &Span) -> Span {
        Span {
            source: self.source.clone(),
            line: start.line,
            col: start.col,
            start: start.start,
            end: end.end,
        }
    }

    // Infix operator table.

    fn current_infix(&mut self) -> Result<Option<(InfixKind, u8)>> {
        let op = match self.tok.0 {
            TokenKind::Symbol => match self.token_text() {
                "." => (InfixKind::Dot, PREC_POSTFIX),
                "[" => (InfixKind::Subscript, PREC_POSTFIX),
                ":" => (InfixKind::Pair, PREC_PAIR),
                "==" | "=" => (InfixKind::Cmp(CmpOp::Eq), PREC_CMP),
                "!=" => (InfixKind::Cmp(CmpOp::Ne), PREC_CMP),
                "<" => (InfixKind::Cmp(CmpOp::Lt), PREC_CMP),
                "<=" => (InfixKind::Cmp(CmpOp::Le), PREC_CMP),
                ">" => (InfixKind::Cmp(CmpOp::Gt), PREC_CMP),
                ">=" => (InfixKind::Cmp(CmpOp::Ge), PREC_CMP),
                "=~" => (InfixKind::Match, PREC_CMP),
                "+" => (InfixKind::Arith(ArithOp::Add), PREC_ADD),
                "-" => (InfixKind::Arith(ArithOp::Sub), PREC_ADD),
                "*" => (InfixKind::Arith(ArithOp::Mul), PREC_MUL),
                "/" => (InfixKind::Arith(ArithOp::Div), PREC_MUL),
                _ => return Ok(None),
            },
            TokenKind::Ident => {
                let kw = self.token_text();
                if kw.eq_ignore_ascii_case("or") {
                    (InfixKind::Logic(LogicOp::Or), PREC_OR)
                } else if kw.eq_ignore_ascii_case("and") {
                    (InfixKind::Logic(LogicOp::And), PREC_AND)
                } else if kw.eq_ignore_ascii_case("in") {
                    (InfixKind::In, PREC_CMP)
                } else if kw.eq_ignore_ascii_case("not") {
                    let next = self.peek_token()?;
                    if next.0 == TokenKind::Ident && next.1.text().eq_ignore_ascii_case("in") {
                        (InfixKind::NotIn, PREC_CMP)
                    } else {
                        return Ok(None);
                    }
                } else {
                    return Ok(None);
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    // Recursive grammar.

    /// Precedence-climbing loop: keep folding infix operators of at least
    /// `min_prec` into the left-hand side.
    pub fn expression(&mut self, min_prec: u8) -> Result<ExprRef> {
        let mut lhs = self.atom()?;

        while let Some((kind, prec)) = self.current_infix()? {
            if prec < min_prec {
                break;
            }
            self.next_token()?;
            if kind == InfixKind::NotIn {
                // Second keyword of `not in`.
                self.next_token()?;
            }

            lhs = match kind {
                InfixKind::Dot => {
                    let member = self.member_rhs()?;
                    let span = self.span_to(lhs.span(), &member.0);
                    Ref::new(Expr::Resolve {
                        span,
                        obj: lhs,
                        member,
                    })
                }
                InfixKind::Subscript => {
                    let index = self.expression(0)?;
                    self.expect_symbol("]", "to close subscript")?;
                    let span = self.span_to(lhs.span(), index.span());
                    Ref::new(Expr::Index {
                        span,
                        obj: lhs,
                        index,
                    })
                }
                _ => {
                    let rhs = self.expression(prec + 1)?;
                    let span = self.span_to(lhs.span(), rhs.span());
                    match kind {
                        InfixKind::Logic(op) => Ref::new(Expr::Logic { span, op, lhs, rhs }),
                        InfixKind::Cmp(op) => Ref::new(Expr::Cmp { span, op, lhs, rhs }),
                        InfixKind::Arith(op) => Ref::new(Expr::Arith { span, op, lhs, rhs }),
                        InfixKind::Match => Ref::new(Expr::RegexMatch {
                            span,
                            value: lhs,
                            pattern: rhs,
                        }),
                        InfixKind::In => Ref::new(Expr::Membership {
                            span,
                            element: lhs,
                            collection: rhs,
                        }),
                        InfixKind::NotIn => {
                            let inner = Ref::new(Expr::Membership {
                                span: span.clone(),
                                element: lhs,
                                collection: rhs,
                            });
                            Ref::new(Expr::Unary {
                                span,
                                op: UnaryOp::Not,
                                expr: inner,
                            })
                        }
                        InfixKind::Pair => Ref::new(Expr::Pair {
                            span,
                            key: lhs,
                            value: rhs,
                        }),
                        InfixKind::Dot | InfixKind::Subscript => unreachable!(),
                    }
                }
            };
        }

        Ok(lhs)
    }

    /// The right-hand side of a dot is an identifier, recorded as a member
    /// name rather than a variable reference.
    fn member_rhs(&mut self) -> Result<(Span, Arc<str>)> {
        match self.tok.0 {
            TokenKind::Ident => {
                let span = self.tok.1.clone();
                let name: Arc<str> = span.text().into();
                self.next_token()?;
                Ok((span, name))
            }
            _ => Err(self.tok.1.error("expecting a member name after `.`")),
        }
    }

    fn atom(&mut self) -> Result<ExprRef> {
        match self.tok.0 {
            TokenKind::Param => {
                let span = self.tok.1.clone();
                let value = self.params.lookup(span.text())?;
                self.next_token()?;
                return Ok(Ref::new(Expr::Literal { span, value }));
            }
            TokenKind::Number => {
                let span = self.tok.1.clone();
                let n = Number::from_str(span.text())
                    .map_err(|_| span.error("invalid number literal"))?;
                self.next_token()?;
                return Ok(Ref::new(Expr::Literal {
                    span,
                    value: Value::Number(n),
                }));
            }
            TokenKind::String => {
                let span = self.tok.1.clone();
                let value = Value::from(unescape(span.text()));
                self.next_token()?;
                return Ok(Ref::new(Expr::Literal { span, value }));
            }
            TokenKind::Eof => return Err(self.tok.1.error("unexpected end of input")),
            _ => (),
        }

        if let Some(kw) = self.kw() {
            return self.keyword_atom(&kw);
        }

        let span = self.tok.1.clone();
        match self.token_text() {
            "-" => {
                self.next_token()?;
                let expr = self.expression(PREC_NEG)?;
                let span = self.span_to(&span, expr.span());
                Ok(Ref::new(Expr::Unary {
                    span,
                    op: UnaryOp::Neg,
                    expr,
                }))
            }
            "(" => {
                // Parens contain one or more expressions. Several
                // comma-separated expressions form a repeated value.
                self.next_token()?;
                let mut items = vec![self.expression(0)?];
                while self.accept_symbol(",")? {
                    items.push(self.expression(0)?);
                }
                let end = self.tok.1.clone();
                self.expect_symbol(")", "to close group")?;
                if items.len() == 1 {
                    return Ok(items.remove(0));
                }
                Ok(Ref::new(Expr::Seq {
                    span: self.span_to(&span, &end),
                    items,
                }))
            }
            "[" => self.list(span),
            _ => Err(self.tok.1.error("was not expecting this here")),
        }
    }

    fn keyword_atom(&mut self, kw: &str) -> Result<ExprRef> {
        let span = self.tok.1.clone();

        match kw {
            "let" => {
                self.next_token()?;
                return self.let_expr(span);
            }
            "select" => {
                self.next_token()?;
                return self.select(span);
            }
            "any" => {
                // ANY can start a pseudo-SQL query or be the any() builtin.
                let next = self.peek_token()?;
                self.next_token()?;
                if next.0 == TokenKind::Symbol && next.1.text() == "(" {
                    return self.builtin("any", span);
                }
                return self.select_any(span);
            }
            "if" => {
                self.next_token()?;
                return self.if_expr(span);
            }
            "not" => {
                self.next_token()?;
                let expr = self.expression(PREC_CMP)?;
                let span = self.span_to(&span, expr.span());
                return Ok(Ref::new(Expr::Unary {
                    span,
                    op: UnaryOp::Not,
                    expr,
                }));
            }
            "true" | "false" => {
                self.next_token()?;
                return Ok(Ref::new(Expr::Literal {
                    span,
                    value: Value::Bool(kw == "true"),
                }));
            }
            "null" => {
                self.next_token()?;
                return Ok(Ref::new(Expr::Literal {
                    span,
                    value: Value::Null,
                }));
            }
            "then" | "else" => {
                let msg = format!("`{kw}` is only valid inside an if expression");
                return Err(span.error(&msg));
            }
            _ if SQL_RESERVED_KEYWORDS.contains(&kw) => {
                let msg = format!("`{kw}` is only valid inside a SELECT expression");
                return Err(span.error(&msg));
            }
            "map" | "filter" | "sort" | "rsort" | "each" | "bind" => {
                self.next_token()?;
                return self.builtin(kw, span);
            }
            _ => (),
        }

        // Function application or a plain variable.
        let name = self.token_text().to_string();
        let next = self.peek_token()?;
        self.next_token()?;

        if next.0 == TokenKind::Symbol && next.1.text() == "(" {
            if span.end != next.1.start {
                return Err(next
                    .1
                    .error("no whitespace allowed between function and paren"));
            }
            let func = Ref::new(Expr::Var {
                span: span.clone(),
                name: name.as_str().into(),
            });
            return self.application(func, span);
        }

        if let Some(aliased) = self.aliases.last().and_then(|m| m.get(&name)) {
            return Ok(aliased.clone());
        }

        Ok(Ref::new(Expr::Var {
            span,
            name: name.as_str().into(),
        }))
    }

    fn application(&mut self, func: ExprRef, start: Span) -> Result<ExprRef> {
        self.expect_symbol("(", "to open argument list")?;
        let mut args = vec![];
        if !self.at_symbol(")") {
            args.push(self.expression(0)?);
            while self.accept_symbol(",")? {
                args.push(self.expression(0)?);
            }
        }
        let end = self.tok.1.clone();
        self.expect_symbol(")", "to close argument list")?;
        Ok(Ref::new(Expr::Call {
            span: self.span_to(&start, &end),
            func,
            args,
        }))
    }

    /// The pseudo-function subgrammar: `map`, `filter`, `sort`, `rsort`,
    /// `any`, `each` and `bind` cannot be overridden by variables.
    fn builtin(&mut self, kw: &str, start: Span) -> Result<ExprRef> {
        if !self.at_symbol("(") {
            let msg = format!("expecting `(` after `{kw}`");
            return Err(self.tok.1.error(&msg));
        }
        if self.tok.1.start != start.end {
            return Err(self
                .tok
                .1
                .error("no whitespace allowed between function and paren"));
        }
        self.next_token()?;

        let mut args = vec![self.expression(0)?];
        while self.accept_symbol(",")? {
            args.push(self.expression(0)?);
        }
        let end = self.tok.1.clone();
        self.expect_symbol(")", "to close argument list")?;
        let span = self.span_to(&start, &end);

        match kw {
            "map" => match &args[..] {
                [source, expr] => Ok(Ref::new(Expr::Map {
                    span,
                    source: source.clone(),
                    expr: expr.clone(),
                })),
                _ => Err(Self::builtin_arity_err(&span, kw, 2, args.len())),
            },
            "filter" => match &args[..] {
                [source, predicate] => Ok(Ref::new(Expr::Filter {
                    span,
                    source: source.clone(),
                    predicate: predicate.clone(),
                })),
                _ => Err(Self::builtin_arity_err(&span, kw, 2, args.len())),
            },
            "sort" | "rsort" => match &args[..] {
                [source, key] => Ok(Ref::new(Expr::Sort {
                    span,
                    source: source.clone(),
                    key: key.clone(),
                    descending: kw == "rsort",
                })),
                _ => Err(Self::builtin_arity_err(&span, kw, 2, args.len())),
            },
            "each" => match &args[..] {
                [source, predicate] => Ok(Ref::new(Expr::Each {
                    span,
                    source: source.clone(),
                    predicate: predicate.clone(),
                })),
                _ => Err(Self::builtin_arity_err(&span, kw, 2, args.len())),
            },
            "any" => match &args[..] {
                [source] => Ok(Ref::new(Expr::Any {
                    span,
                    source: source.clone(),
                    predicate: None,
                })),
                [source, predicate] => Ok(Ref::new(Expr::Any {
                    span,
                    source: source.clone(),
                    predicate: Some(predicate.clone()),
                })),
                _ => Err(Self::builtin_arity_err(&span, kw, 2, args.len())),
            },
            "bind" => {
                for arg in &args {
                    if !matches!(arg.as_ref(), Expr::Pair { .. }) {
                        return Err(arg.span().error("bind expects `key: value` pairs"));
                    }
                }
                Ok(Ref::new(Expr::Bind { span, pairs: args }))
            }
            _ => Err(span.error("unknown builtin")),
        }
    }

    fn builtin_arity_err(span: &Span, kw: &str, expected: usize, got: usize) -> crate::Error {
        let msg = format!("{kw} expects {expected} argument(s), but was passed {got}");
        span.error(&msg)
    }

    /// `let (x = 5, y = 10) x + y`; parens around the bindings optional.
    fn let_expr(&mut self, start: Span) -> Result<ExprRef> {
        let mut expect_rparens = 0usize;
        while self.accept_symbol("(")? {
            expect_rparens += 1;
        }

        let mut pairs = vec![];
        loop {
            if self.tok.0 != TokenKind::Ident {
                return Err(self.tok.1.error("expecting a binding name"));
            }
            let name_span = self.tok.1.clone();
            let key = Ref::new(Expr::Literal {
                span: name_span.clone(),
                value: Value::from(name_span.text()),
            });
            self.next_token()?;

            self.expect_symbol("=", "in let binding")?;

            let value = self.expression(0)?;
            let span = self.span_to(&name_span, value.span());
            pairs.push(Ref::new(Expr::Pair { span, key, value }));

            if !self.accept_symbol(",")? {
                break;
            }
        }

        let bind_span = self.span_to(pairs[0].span(), pairs[pairs.len() - 1].span());
        let bindings = Ref::new(Expr::Bind {
            span: bind_span,
            pairs,
        });

        while expect_rparens > 0 {
            self.expect_symbol(")", "to close let bindings")?;
            expect_rparens -= 1;
        }

        let body = self.expression(0)?;
        let span = self.span_to(&start, body.span());
        Ok(Ref::new(Expr::Let {
            span,
            bindings,
            body,
        }))
    }

    fn if_expr(&mut self, start: Span) -> Result<ExprRef> {
        let mut conditions = vec![];

        let cond = self.expression(0)?;
        self.expect_kw("then", "after if condition")?;
        conditions.push((cond, self.expression(0)?));

        let mut default = None;
        while self.accept_kw("else")? {
            if self.accept_kw("if")? {
                let cond = self.expression(0)?;
                self.expect_kw("then", "after if condition")?;
                conditions.push((cond, self.expression(0)?));
            } else {
                default = Some(self.expression(0)?);
                break;
            }
        }

        let default = match default {
            Some(d) => d,
            None => Ref::new(Expr::Literal {
                span: self.tok.1.clone(),
                value: Value::Null,
            }),
        };

        let span = self.span_to(&start, default.span());
        Ok(Ref::new(Expr::IfElse {
            span,
            conditions,
            default,
        }))
    }

    fn list(&mut self, start: Span) -> Result<ExprRef> {
        self.next_token()?;
        let mut items = vec![];
        if !self.at_symbol("]") {
            items.push(self.expression(0)?);
            while self.accept_symbol(",")? {
                items.push(self.expression(0)?);
            }
        }
        let end = self.tok.1.clone();
        self.expect_symbol("]", "to close list")?;
        Ok(Ref::new(Expr::List {
            span: self.span_to(&start, &end),
            items,
        }))
    }

    // SQL subgrammar.

    fn select(&mut self, start: Span) -> Result<ExprRef> {
        self.aliases.push(HashMap::new());
        let result = self.select_inner(start);
        self.aliases.pop();
        result
    }

    fn select_inner(&mut self, start: Span) -> Result<ExprRef> {
        if self.accept_kw("any")? {
            return self.select_any(start);
        }

        if self.accept_symbol("*")? {
            // The FROM after SELECT * is required.
            self.expect_kw("from", "after `select *`")?;
            return self.select_from();
        }

        self.select_what(start)
    }

    /// `SELECT ANY [FROM] source [WHERE predicate]`. The full form is
    /// preferred but `ANY source` alone is a useful boolean indicator.
    fn select_any(&mut self, start: Span) -> Result<ExprRef> {
        self.accept_kw("from")?;

        let source = self.expression(0)?;
        let predicate = if self.accept_kw("where")? {
            Some(self.expression(0)?)
        } else {
            None
        };

        // ORDER after ANY doesn't make any sense.
        if self.at_kw("order") {
            return Err(self.tok.1.error("ORDER BY cannot follow ANY"));
        }

        let end = match &predicate {
            Some(p) => p.span().clone(),
            None => source.span().clone(),
        };
        Ok(Ref::new(Expr::Any {
            span: self.span_to(&start, &end),
            source,
            predicate,
        }))
    }

    /// Projection list: `expr [AS name], ...` followed by FROM.
    fn select_what(&mut self, start: Span) -> Result<ExprRef> {
        let mut used_names: Vec<String> = vec![];
        let mut pairs: Vec<ExprRef> = vec![];

        let mut idx = 0usize;
        loop {
            let value = self.expression(0)?;

            let key = if self.accept_kw("as")? {
                if self.tok.0 != TokenKind::Ident {
                    return Err(self.tok.1.error("expecting a column name after `as`"));
                }
                let name_span = self.tok.1.clone();
                let name = name_span.text().to_string();
                self.next_token()?;

                if used_names.contains(&name) {
                    let msg = format!("duplicate `as` name `{name}`");
                    return Err(name_span.error(&msg));
                }
                if let Some(aliases) = self.aliases.last_mut() {
                    aliases.insert(name.clone(), value.clone());
                }
                used_names.push(name.clone());
                Ref::new(Expr::Literal {
                    span: name_span,
                    value: Value::from(name),
                })
            } else {
                // Guess the column name the way most SQL databases do,
                // falling back to the column's ordinal.
                let name = match Self::guess_name_of(&value) {
                    Some(n) if !used_names.contains(&n) => n,
                    _ => format!("column_{idx}"),
                };
                used_names.push(name.clone());
                Ref::new(Expr::Literal {
                    span: value.span().clone(),
                    value: Value::from(name),
                })
            };

            let span = self.span_to(value.span(), key.span());
            pairs.push(Ref::new(Expr::Pair { span, key, value }));

            if self.accept_kw("from")? {
                let source = self.select_from()?;
                let bind_span = self.span_to(pairs[0].span(), pairs[pairs.len() - 1].span());
                let expr = Ref::new(Expr::Bind {
                    span: bind_span,
                    pairs,
                });
                let span = self.span_to(&start, source.span());
                return Ok(Ref::new(Expr::Map { span, source, expr }));
            }

            self.expect_symbol(",", "between selected columns")?;
            idx += 1;
        }
    }

    fn guess_name_of(expr: &ExprRef) -> Option<String> {
        match expr.as_ref() {
            Expr::Var { name, .. } => Some(name.to_string()),
            Expr::Resolve { member, .. } => Some(member.1.to_string()),
            Expr::Index { obj, index, .. } => match index.as_ref() {
                Expr::Literal {
                    value: Value::String(key),
                    ..
                } => Some(format!("{}_{key}", Self::guess_name_of(obj)?)),
                Expr::Literal {
                    value: Value::Number(n),
                    ..
                } => Some(format!("{}_{n}", Self::guess_name_of(obj)?)),
                _ => None,
            },
            Expr::Call { func, .. } => match func.as_ref() {
                Expr::Var { name, .. } => Some(name.to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    fn select_from(&mut self) -> Result<ExprRef> {
        let source = self.expression(0)?;
        if self.accept_kw("where")? {
            return self.select_where(source);
        }
        if self.accept_order_by()? {
            return self.select_order(source);
        }
        if self.accept_kw("limit")? {
            return self.select_limit(source);
        }
        Ok(source)
    }

    fn select_where(&mut self, source: ExprRef) -> Result<ExprRef> {
        let predicate = self.expression(0)?;
        let span = self.span_to(source.span(), predicate.span());
        let filtered = Ref::new(Expr::Filter {
            span,
            source,
            predicate,
        });

        if self.accept_order_by()? {
            return self.select_order(filtered);
        }
        if self.accept_kw("limit")? {
            return self.select_limit(filtered);
        }
        Ok(filtered)
    }

    fn select_order(&mut self, source: ExprRef) -> Result<ExprRef> {
        let key = self.expression(0)?;

        let mut descending = false;
        if self.accept_kw("asc")? {
            // The default.
        } else if self.accept_kw("desc")? {
            descending = true;
        }

        let span = self.span_to(source.span(), key.span());
        let sorted = Ref::new(Expr::Sort {
            span,
            source,
            key,
            descending,
        });

        if self.accept_kw("limit")? {
            return self.select_limit(sorted);
        }
        Ok(sorted)
    }

    /// `LIMIT take [OFFSET drop]`, desugared onto the stdlib take/drop
    /// functions. Drop before taking, because obviously.
    fn select_limit(&mut self, source: ExprRef) -> Result<ExprRef> {
        let count = self.expression(0)?;

        let source = if self.accept_kw("offset")? {
            let skip = self.expression(0)?;
            let span = self.span_to(source.span(), skip.span());
            Ref::new(Expr::Call {
                span: span.clone(),
                func: Ref::new(Expr::Var {
                    span,
                    name: "drop".into(),
                }),
                args: vec![skip, source],
            })
        } else {
            source
        };

        let span = self.span_to(source.span(), count.span());
        Ok(Ref::new(Expr::Call {
            span: span.clone(),
            func: Ref::new(Expr::Var {
                span,
                name: "take".into(),
            }),
            args: vec![count, source],
        }))
    }
}
