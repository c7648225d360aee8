// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::errors::Result;
use crate::lexer::*;
use crate::number::Number;
use crate::params::ParamBinder;
use crate::value::Value;

use std::str::FromStr;

/// Parser for the Lisp-like dialect.
///
/// Prefix s-expressions over the same lexer and AST as the SQL dialect;
/// the dialect exists primarily to make the shape of a query's tree
/// explicit. Bare numbers, strings, `true`, `false` and `null` are
/// literals; everything else is a `(form ...)`.
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    params: ParamBinder,
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
        })
    }

    pub fn into_params(self) -> ParamBinder {
        self.params
    }

    pub fn parse(&mut self) -> Result<ExprRef> {
        let expr = self.atom()?;
        if self.tok.0 != TokenKind::Eof {
            let msg = format!("unexpected `{}` after expression", self.tok.1.text());
            return Err(self.tok.1.error(&msg));
        }
        Ok(expr)
    }

    fn next_token(&mut self) -> Result<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
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

    fn atom(&mut self) -> Result<ExprRef> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Number => {
                let n = Number::from_str(span.text())
                    .map_err(|_| span.error("invalid number literal"))?;
                self.next_token()?;
                Ok(Ref::new(Expr::Literal {
                    span,
                    value: Value::Number(n),
                }))
            }
            TokenKind::String => {
                let value = Value::from(unescape(span.text()));
                self.next_token()?;
                Ok(Ref::new(Expr::Literal { span, value }))
            }
            TokenKind::Param => {
                let value = self.params.lookup(span.text())?;
                self.next_token()?;
                Ok(Ref::new(Expr::Literal { span, value }))
            }
            TokenKind::Ident => {
                let value = match span.text().to_ascii_lowercase().as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    other => {
                        let msg =
                            format!("bare symbol `{other}`. Did you mean `(var {other})`?");
                        return Err(span.error(&msg));
                    }
                };
                self.next_token()?;
                Ok(Ref::new(Expr::Literal { span, value }))
            }
            TokenKind::Symbol if span.text() == "(" => {
                self.next_token()?;
                self.form(span)
            }
            TokenKind::Eof => Err(span.error("unexpected end of input")),
            _ => Err(span.error("was not expecting this here")),
        }
    }

    /// Parse the body of one `(op child ...)` form; the opening paren has
    /// been consumed.
    fn form(&mut self, start: Span) -> Result<ExprRef> {
        let op_span = self.tok.1.clone();
        let op = match self.tok.0 {
            TokenKind::Ident | TokenKind::Symbol => op_span.text().to_string(),
            _ => return Err(op_span.error("expecting a form name")),
        };
        self.next_token()?;

        // Forms whose children are not plain subexpressions.
        match op.as_str() {
            "var" => {
                let name_span = self.tok.1.clone();
                if self.tok.0 != TokenKind::Ident && self.tok.0 != TokenKind::String {
                    return Err(name_span.error("expecting a variable name"));
                }
                let name: std::sync::Arc<str> = match self.tok.0 {
                    TokenKind::String => unescape(name_span.text()).into(),
                    _ => name_span.text().into(),
                };
                self.next_token()?;
                let end = self.close(&start)?;
                return Ok(Ref::new(Expr::Var {
                    span: self.span_to(&start, &end),
                    name,
                }));
            }
            "param" => {
                // Params are interpolated right away.
                let value = match self.tok.0 {
                    TokenKind::Number | TokenKind::Ident => {
                        let v = self.params.lookup(self.tok.1.text())?;
                        self.next_token()?;
                        v
                    }
                    // `(param)` auto-indexes.
                    _ => self.params.lookup("")?,
                };
                let end = self.close(&start)?;
                return Ok(Ref::new(Expr::Literal {
                    span: self.span_to(&start, &end),
                    value,
                }));
            }
            "." => {
                let obj = self.atom()?;
                let member_span = self.tok.1.clone();
                if self.tok.0 != TokenKind::Ident && self.tok.0 != TokenKind::String {
                    return Err(member_span.error("expecting a member name"));
                }
                let member: std::sync::Arc<str> = match self.tok.0 {
                    TokenKind::String => unescape(member_span.text()).into(),
                    _ => member_span.text().into(),
                };
                self.next_token()?;
                let end = self.close(&start)?;
                return Ok(Ref::new(Expr::Resolve {
                    span: self.span_to(&start, &end),
                    obj,
                    member: (member_span, member),
                }));
            }
            _ => (),
        }

        let mut children = vec![];
        while !self.at_close() {
            children.push(self.atom()?);
        }
        let end = self.close(&start)?;
        let span = self.span_to(&start, &end);

        self.build(&op, &op_span, span, children)
    }

    fn at_close(&self) -> bool {
        matches!(self.tok.0, TokenKind::Symbol) && self.tok.1.text() == ")"
            || matches!(self.tok.0, TokenKind::Eof)
    }

    fn close(&mut self, start: &Span) -> Result<Span> {
        if matches!(self.tok.0, TokenKind::Symbol) && self.tok.1.text() == ")" {
            let end = self.tok.1.clone();
            self.next_token()?;
            Ok(end)
        } else {
            Err(start.error("unclosed form"))
        }
    }

    fn build(
        &self,
        op: &str,
        op_span: &Span,
        span: Span,
        mut children: Vec<ExprRef>,
    ) -> Result<ExprRef> {
        let arity = |expected: usize, got: usize| {
            let msg = format!("`{op}` expects {expected} child(ren), got {got}");
            op_span.error(&msg)
        };

        // Variadic forms fold left into binary nodes.
        let fold =
            |mut children: Vec<ExprRef>,
             f: &dyn Fn(Span, ExprRef, ExprRef) -> Expr|
             -> Result<ExprRef> {
                if children.len() < 2 {
                    return Err(arity(2, children.len()));
                }
                let mut iter = children.drain(..);
                let mut acc = match iter.next() {
                    Some(c) => c,
                    None => return Err(arity(2, 0)),
                };
                for child in iter {
                    let span = Span {
                        source: span.source.clone(),
                        line: span.line,
                        col: span.col,
                        start: acc.span().start,
                        end: child.span().end,
                    };
                    acc = Ref::new(f(span, acc, child));
                }
                Ok(acc)
            };

        let two = |children: &mut Vec<ExprRef>| -> Result<(ExprRef, ExprRef)> {
            match (children.pop(), children.pop(), children.is_empty()) {
                (Some(b), Some(a), true) => Ok((a, b)),
                (b, a, _) => Err(arity(
                    2,
                    children.len() + usize::from(a.is_some()) + usize::from(b.is_some()),
                )),
            }
        };

        match op {
            "!" | "not" => match &children[..] {
                [expr] => Ok(Ref::new(Expr::Unary {
                    span,
                    op: UnaryOp::Not,
                    expr: expr.clone(),
                })),
                _ => Err(arity(1, children.len())),
            },
            "neg" => match &children[..] {
                [expr] => Ok(Ref::new(Expr::Unary {
                    span,
                    op: UnaryOp::Neg,
                    expr: expr.clone(),
                })),
                _ => Err(arity(1, children.len())),
            },
            "+" => fold(children, &|span, lhs, rhs| Expr::Arith {
                span,
                op: ArithOp::Add,
                lhs,
                rhs,
            }),
            "-" => fold(children, &|span, lhs, rhs| Expr::Arith {
                span,
                op: ArithOp::Sub,
                lhs,
                rhs,
            }),
            "*" => fold(children, &|span, lhs, rhs| Expr::Arith {
                span,
                op: ArithOp::Mul,
                lhs,
                rhs,
            }),
            "/" => fold(children, &|span, lhs, rhs| Expr::Arith {
                span,
                op: ArithOp::Div,
                lhs,
                rhs,
            }),
            "&" | "and" => fold(children, &|span, lhs, rhs| Expr::Logic {
                span,
                op: LogicOp::And,
                lhs,
                rhs,
            }),
            "|" | "or" => fold(children, &|span, lhs, rhs| Expr::Logic {
                span,
                op: LogicOp::Or,
                lhs,
                rhs,
            }),
            "==" | "=" | "!=" | "<" | "<=" | ">" | ">=" => {
                let cmp = match op {
                    "==" | "=" => CmpOp::Eq,
                    "!=" => CmpOp::Ne,
                    "<" => CmpOp::Lt,
                    "<=" => CmpOp::Le,
                    ">" => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                let (lhs, rhs) = two(&mut children)?;
                Ok(Ref::new(Expr::Cmp {
                    span,
                    op: cmp,
                    lhs,
                    rhs,
                }))
            }
            "=~" => {
                let (value, pattern) = two(&mut children)?;
                Ok(Ref::new(Expr::RegexMatch {
                    span,
                    value,
                    pattern,
                }))
            }
            "in" => {
                let (element, collection) = two(&mut children)?;
                Ok(Ref::new(Expr::Membership {
                    span,
                    element,
                    collection,
                }))
            }
            ":" | "pair" => {
                let (key, value) = two(&mut children)?;
                Ok(Ref::new(Expr::Pair { span, key, value }))
            }
            "select" => {
                let (obj, index) = two(&mut children)?;
                Ok(Ref::new(Expr::Index { span, obj, index }))
            }
            "apply" => {
                if children.is_empty() {
                    return Err(arity(1, 0));
                }
                let func = children.remove(0);
                Ok(Ref::new(Expr::Call {
                    span,
                    func,
                    args: children,
                }))
            }
            "map" => {
                let (source, expr) = two(&mut children)?;
                Ok(Ref::new(Expr::Map { span, source, expr }))
            }
            "filter" => {
                let (source, predicate) = two(&mut children)?;
                Ok(Ref::new(Expr::Filter {
                    span,
                    source,
                    predicate,
                }))
            }
            "sort" | "rsort" => {
                let (source, key) = two(&mut children)?;
                Ok(Ref::new(Expr::Sort {
                    span,
                    source,
                    key,
                    descending: op == "rsort",
                }))
            }
            "any" => match children.len() {
                1 => Ok(Ref::new(Expr::Any {
                    span,
                    source: children.remove(0),
                    predicate: None,
                })),
                2 => {
                    let (source, predicate) = two(&mut children)?;
                    Ok(Ref::new(Expr::Any {
                        span,
                        source,
                        predicate: Some(predicate),
                    }))
                }
                n => Err(arity(2, n)),
            },
            "each" => {
                let (source, predicate) = two(&mut children)?;
                Ok(Ref::new(Expr::Each {
                    span,
                    source,
                    predicate,
                }))
            }
            "bind" => {
                for child in &children {
                    if !matches!(child.as_ref(), Expr::Pair { .. }) {
                        return Err(child.span().error("bind expects (: key value) pairs"));
                    }
                }
                Ok(Ref::new(Expr::Bind {
                    span,
                    pairs: children,
                }))
            }
            "let" => {
                let (bindings, body) = two(&mut children)?;
                if !matches!(bindings.as_ref(), Expr::Bind { .. }) {
                    return Err(bindings.span().error("let expects a (bind ...) form"));
                }
                Ok(Ref::new(Expr::Let {
                    span,
                    bindings,
                    body,
                }))
            }
            "if" => {
                if children.len() < 2 {
                    return Err(arity(2, children.len()));
                }
                let default = if children.len() % 2 == 1 {
                    match children.pop() {
                        Some(d) => d,
                        None => return Err(arity(2, 0)),
                    }
                } else {
                    Ref::new(Expr::Literal {
                        span: span.clone(),
                        value: Value::Null,
                    })
                };
                let mut conditions = vec![];
                let mut iter = children.drain(..);
                while let (Some(cond), Some(value)) = (iter.next(), iter.next()) {
                    conditions.push((cond, value));
                }
                drop(iter);
                Ok(Ref::new(Expr::IfElse {
                    span,
                    conditions,
                    default,
                }))
            }
            "list" | "tuple" => Ok(Ref::new(Expr::List {
                span,
                items: children,
            })),
            "seq" | "repeat" => Ok(Ref::new(Expr::Seq {
                span,
                items: children,
            })),
            _ => {
                let msg = format!("unknown form `{op}`");
                Err(op_span.error(&msg))
            }
        }
    }
}
