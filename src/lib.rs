// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod builtins;
mod engine;
mod errors;
mod eval;
mod infer;
mod lexer;
mod lisp;
mod matcher;
mod number;
mod params;
mod parser;
mod registry;
mod render;
mod scope;
mod value;

pub use builtins::register_host_types;
pub use engine::{CompiledQuery, Dialect, Engine};
pub use errors::{Error, Result};
pub use eval::eval;
pub use infer::{infer, lint, TypeKind};
pub use matcher::matches;
pub use number::Number;
pub use params::Replacements;
pub use registry::{
    ApplicativeOps, AssociativeOps, Capability, CapabilityImpl, CapabilityRegistry, NumberOps,
    OrderedOps, RepeatedOps, StructuredOps,
};
pub use render::render;
pub use scope::ScopeStack;
pub use value::{HostRef, Value};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::lexer::*;
    pub use crate::lisp::Parser as LispParser;
    pub use crate::params::ParamBinder;
    pub use crate::parser::Parser;
}
