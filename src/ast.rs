// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::Span;
use crate::value::Value;

use core::{cmp, fmt, ops::Deref};
use std::sync::Arc;

pub struct NodeRef<T> {
    r: Arc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.r).eq(&Arc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> cmp::Ord for NodeRef<T> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        Arc::as_ptr(&self.r).cmp(&Arc::as_ptr(&other.r))
    }
}

impl<T> cmp::PartialOrd for NodeRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Arc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicOp {
    And,
    Or,
}

/// The shared intermediate representation every dialect parses into and
/// every solver walks.
///
/// Nodes are immutable once constructed, own their children exclusively and
/// never hold references back to a solver or to the capability registry.
#[derive(Debug)]
pub enum Expr {
    /// A literal value. Replacement parameters also compile to this node.
    Literal { span: Span, value: Value },

    Var {
        span: Span,
        name: Arc<str>,
    },

    Unary {
        span: Span,
        op: UnaryOp,
        expr: Ref<Expr>,
    },

    Arith {
        span: Span,
        op: ArithOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    Cmp {
        span: Span,
        op: CmpOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    /// Short-circuiting logical connective.
    Logic {
        span: Span,
        op: LogicOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    /// `element in collection`.
    Membership {
        span: Span,
        element: Ref<Expr>,
        collection: Ref<Expr>,
    },

    /// `value =~ pattern` (case-insensitive regex search).
    RegexMatch {
        span: Span,
        value: Ref<Expr>,
        pattern: Ref<Expr>,
    },

    /// Member access: `obj.member`.
    Resolve {
        span: Span,
        obj: Ref<Expr>,
        member: (Span, Arc<str>),
    },

    /// Keyed access: `obj[key]`.
    Index {
        span: Span,
        obj: Ref<Expr>,
        index: Ref<Expr>,
    },

    /// Function application.
    Call {
        span: Span,
        func: Ref<Expr>,
        args: Vec<Ref<Expr>>,
    },

    /// A key/value pair (`key: value`); used inside `bind`.
    Pair {
        span: Span,
        key: Ref<Expr>,
        value: Ref<Expr>,
    },

    /// A list literal: `[a, b, c]`.
    List {
        span: Span,
        items: Vec<Ref<Expr>>,
    },

    /// A repeated-value group: `(a, b, c)`.
    Seq {
        span: Span,
        items: Vec<Ref<Expr>>,
    },

    /// Row constructor from pairs.
    Bind {
        span: Span,
        pairs: Vec<Ref<Expr>>,
    },

    /// Projection: evaluate `expr` once per element of `source`, in source
    /// order.
    Map {
        span: Span,
        source: Ref<Expr>,
        expr: Ref<Expr>,
    },

    /// Keep elements of `source` for which `predicate` holds.
    Filter {
        span: Span,
        source: Ref<Expr>,
        predicate: Ref<Expr>,
    },

    /// Stable sort of `source` by `key`; ties keep source order in both
    /// directions.
    Sort {
        span: Span,
        source: Ref<Expr>,
        key: Ref<Expr>,
        descending: bool,
    },

    /// True if `predicate` (or existence, when absent) holds for some
    /// element.
    Any {
        span: Span,
        source: Ref<Expr>,
        predicate: Option<Ref<Expr>>,
    },

    /// True if `predicate` holds for every element.
    Each {
        span: Span,
        source: Ref<Expr>,
        predicate: Ref<Expr>,
    },

    /// Evaluate `body` with `bindings` (a Bind node) pushed as a scope.
    Let {
        span: Span,
        bindings: Ref<Expr>,
        body: Ref<Expr>,
    },

    /// if/else-if/else chain; `default` is a null literal when no else
    /// branch was written.
    IfElse {
        span: Span,
        conditions: Vec<(Ref<Expr>, Ref<Expr>)>,
        default: Ref<Expr>,
    },
}

impl Expr {
    pub const fn span(&self) -> &Span {
        match *self {
            Self::Literal { ref span, .. }
            | Self::Var { ref span, .. }
            | Self::Unary { ref span, .. }
            | Self::Arith { ref span, .. }
            | Self::Cmp { ref span, .. }
            | Self::Logic { ref span, .. }
            | Self::Membership { ref span, .. }
            | Self::RegexMatch { ref span, .. }
            | Self::Resolve { ref span, .. }
            | Self::Index { ref span, .. }
            | Self::Call { ref span, .. }
            | Self::Pair { ref span, .. }
            | Self::List { ref span, .. }
            | Self::Seq { ref span, .. }
            | Self::Bind { ref span, .. }
            | Self::Map { ref span, .. }
            | Self::Filter { ref span, .. }
            | Self::Sort { ref span, .. }
            | Self::Any { ref span, .. }
            | Self::Each { ref span, .. }
            | Self::Let { ref span, .. }
            | Self::IfElse { ref span, .. } => span,
        }
    }

    pub const fn kind_name(&self) -> &'static str {
        match *self {
            Self::Literal { .. } => "literal",
            Self::Var { .. } => "var",
            Self::Unary { .. } => "unary",
            Self::Arith { .. } => "arithmetic",
            Self::Cmp { .. } => "comparison",
            Self::Logic { .. } => "logic",
            Self::Membership { .. } => "membership",
            Self::RegexMatch { .. } => "regex-match",
            Self::Resolve { .. } => "resolve",
            Self::Index { .. } => "index",
            Self::Call { .. } => "call",
            Self::Pair { .. } => "pair",
            Self::List { .. } => "list",
            Self::Seq { .. } => "seq",
            Self::Bind { .. } => "bind",
            Self::Map { .. } => "map",
            Self::Filter { .. } => "filter",
            Self::Sort { .. } => "sort",
            Self::Any { .. } => "any",
            Self::Each { .. } => "each",
            Self::Let { .. } => "let",
            Self::IfElse { .. } => "if-else",
        }
    }

    /// Structural equality, ignoring spans. NodeRef equality is pointer
    /// identity, so trees from separate parses must be compared with this.
    pub fn deep_eq(&self, other: &Expr) -> bool {
        fn all(a: &[Ref<Expr>], b: &[Ref<Expr>]) -> bool {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
        }

        match (self, other) {
            (Expr::Literal { value: a, .. }, Expr::Literal { value: b, .. }) => a == b,
            (Expr::Var { name: a, .. }, Expr::Var { name: b, .. }) => a == b,
            (
                Expr::Unary { op: a, expr: x, .. },
                Expr::Unary { op: b, expr: y, .. },
            ) => a == b && x.deep_eq(y),
            (
                Expr::Arith {
                    op: a, lhs: al, rhs: ar, ..
                },
                Expr::Arith {
                    op: b, lhs: bl, rhs: br, ..
                },
            ) => a == b && al.deep_eq(bl) && ar.deep_eq(br),
            (
                Expr::Cmp {
                    op: a, lhs: al, rhs: ar, ..
                },
                Expr::Cmp {
                    op: b, lhs: bl, rhs: br, ..
                },
            ) => a == b && al.deep_eq(bl) && ar.deep_eq(br),
            (
                Expr::Logic {
                    op: a, lhs: al, rhs: ar, ..
                },
                Expr::Logic {
                    op: b, lhs: bl, rhs: br, ..
                },
            ) => a == b && al.deep_eq(bl) && ar.deep_eq(br),
            (
                Expr::Membership {
                    element: ae, collection: ac, ..
                },
                Expr::Membership {
                    element: be, collection: bc, ..
                },
            ) => ae.deep_eq(be) && ac.deep_eq(bc),
            (
                Expr::RegexMatch {
                    value: av, pattern: ap, ..
                },
                Expr::RegexMatch {
                    value: bv, pattern: bp, ..
                },
            ) => av.deep_eq(bv) && ap.deep_eq(bp),
            (
                Expr::Resolve {
                    obj: ao, member: am, ..
                },
                Expr::Resolve {
                    obj: bo, member: bm, ..
                },
            ) => ao.deep_eq(bo) && am.1 == bm.1,
            (
                Expr::Index {
                    obj: ao, index: ai, ..
                },
                Expr::Index {
                    obj: bo, index: bi, ..
                },
            ) => ao.deep_eq(bo) && ai.deep_eq(bi),
            (
                Expr::Call {
                    func: af, args: aa, ..
                },
                Expr::Call {
                    func: bf, args: ba, ..
                },
            ) => af.deep_eq(bf) && all(aa, ba),
            (
                Expr::Pair {
                    key: ak, value: av, ..
                },
                Expr::Pair {
                    key: bk, value: bv, ..
                },
            ) => ak.deep_eq(bk) && av.deep_eq(bv),
            (Expr::List { items: a, .. }, Expr::List { items: b, .. }) => all(a, b),
            (Expr::Seq { items: a, .. }, Expr::Seq { items: b, .. }) => all(a, b),
            (Expr::Bind { pairs: a, .. }, Expr::Bind { pairs: b, .. }) => all(a, b),
            (
                Expr::Map {
                    source: asrc, expr: ae, ..
                },
                Expr::Map {
                    source: bsrc, expr: be, ..
                },
            ) => asrc.deep_eq(bsrc) && ae.deep_eq(be),
            (
                Expr::Filter {
                    source: asrc, predicate: ap, ..
                },
                Expr::Filter {
                    source: bsrc, predicate: bp, ..
                },
            ) => asrc.deep_eq(bsrc) && ap.deep_eq(bp),
            (
                Expr::Sort {
                    source: asrc,
                    key: ak,
                    descending: ad,
                    ..
                },
                Expr::Sort {
                    source: bsrc,
                    key: bk,
                    descending: bd,
                    ..
                },
            ) => asrc.deep_eq(bsrc) && ak.deep_eq(bk) && ad == bd,
            (
                Expr::Any {
                    source: asrc, predicate: ap, ..
                },
                Expr::Any {
                    source: bsrc, predicate: bp, ..
                },
            ) => {
                asrc.deep_eq(bsrc)
                    && match (ap, bp) {
                        (Some(x), Some(y)) => x.deep_eq(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (
                Expr::Each {
                    source: asrc, predicate: ap, ..
                },
                Expr::Each {
                    source: bsrc, predicate: bp, ..
                },
            ) => asrc.deep_eq(bsrc) && ap.deep_eq(bp),
            (
                Expr::Let {
                    bindings: ab, body: abody, ..
                },
                Expr::Let {
                    bindings: bb, body: bbody, ..
                },
            ) => ab.deep_eq(bb) && abody.deep_eq(bbody),
            (
                Expr::IfElse {
                    conditions: ac, default: ad, ..
                },
                Expr::IfElse {
                    conditions: bc, default: bd, ..
                },
            ) => {
                ac.len() == bc.len()
                    && ac
                        .iter()
                        .zip(bc.iter())
                        .all(|((c1, v1), (c2, v2))| c1.deep_eq(c2) && v1.deep_eq(v2))
                    && ad.deep_eq(bd)
            }
            _ => false,
        }
    }
}

pub type ExprRef = Ref<Expr>;
