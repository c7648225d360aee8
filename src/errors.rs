// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::engine::Dialect;
use crate::registry::Capability;

/// Errors produced while compiling or running a query.
///
/// Compile-time errors (`Syntax`, `UnboundReplacement`) are reported before
/// any evaluation begins. Run-time errors abort only the evaluation in
/// progress; the compiled query stays valid and can be re-run with different
/// bindings.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed query text. The message carries the rendered source line
    /// with a caret pointing at the offending position.
    #[error("{message}")]
    Syntax { message: String, line: u32, col: u32 },

    /// The query references a placeholder with no replacement value.
    #[error("no replacement value supplied for parameter `{param}`")]
    UnboundReplacement { param: String },

    /// Replacement values were supplied that no placeholder consumed.
    /// Over-supplying is legal; this is only raised by callers that opt
    /// into strict checking.
    #[error("{count} replacement value(s) supplied but never used: {names:?}")]
    UnusedReplacement { count: usize, names: Vec<String> },

    /// A capability was registered twice for the same concrete type.
    #[error("type {type_name} already implements the {capability} capability")]
    DuplicateBinding {
        capability: Capability,
        type_name: &'static str,
    },

    /// A value's concrete type has not registered a required capability.
    #[error("type {type_name} does not implement the {capability} capability")]
    UnsupportedCapability {
        capability: Capability,
        type_name: String,
    },

    /// A solver was handed a node kind it does not claim to support.
    #[error("the {solver} solver does not support {kind} nodes")]
    UnsupportedNode {
        solver: &'static str,
        kind: &'static str,
    },

    /// The target dialect has no surface form for a node kind.
    #[error("{kind} nodes cannot be rendered as {dialect}")]
    Unrenderable {
        dialect: Dialect,
        kind: &'static str,
    },

    /// Two values could not be ordered relative to each other.
    #[error("cannot compare {lhs} with {rhs}")]
    Comparison { lhs: String, rhs: String },

    /// A value had the wrong type for an operation.
    #[error("{0}")]
    Type(String),

    /// A member or key lookup failed.
    #[error("no such member `{0}`")]
    Key(String),

    /// A function was applied to the wrong number of arguments.
    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
