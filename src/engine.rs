// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::ExprRef;
use crate::errors::{Error, Result};
use crate::infer::TypeKind;
use crate::lexer::Source;
use crate::params::{ParamBinder, Replacements};
use crate::registry::{ApplicativeOps, CapabilityImpl, CapabilityRegistry};
use crate::scope::ScopeStack;
use crate::value::{HostRef, Value};
use crate::{builtins, eval, infer, lisp, matcher, parser, render};

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One concrete surface grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sql,
    Lisp,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Sql => "sql",
            Dialect::Lisp => "lisp",
        })
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sql" => Ok(Dialect::Sql),
            "lisp" => Ok(Dialect::Lisp),
            other => Err(Error::Type(format!("no dialect named `{other}`"))),
        }
    }
}

/// A parsed query bound to its dialect and replacement set.
///
/// Immutable and internally shared; one compiled query can be evaluated
/// many times, concurrently, each run with its own bindings. Run-time
/// errors never invalidate the compiled query.
#[derive(Clone)]
pub struct CompiledQuery {
    dialect: Dialect,
    source: Source,
    root: ExprRef,
    unused: Vec<String>,
}

impl CompiledQuery {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn text(&self) -> &str {
        self.source.contents()
    }

    pub fn root(&self) -> &ExprRef {
        &self.root
    }

    /// Re-emit the query in a dialect (not necessarily the one it was
    /// written in).
    pub fn render(&self, dialect: Dialect) -> Result<String> {
        render::render(&self.root, dialect)
    }

    /// Estimated result kind, without evaluating.
    pub fn infer(&self) -> TypeKind {
        infer::infer(&self.root)
    }

    /// Advisory type warnings, without evaluating.
    pub fn lint(&self) -> Vec<String> {
        infer::lint(&self.root)
    }

    /// Replacement values that no placeholder consumed. Over-supplying is
    /// not an error by itself.
    pub fn unused_replacements(&self) -> &[String] {
        &self.unused
    }

    /// Strict variant for callers that consider over-supplied replacement
    /// values a bug.
    pub fn ensure_replacements_used(&self) -> Result<()> {
        if self.unused.is_empty() {
            Ok(())
        } else {
            Err(Error::UnusedReplacement {
                count: self.unused.len(),
                names: self.unused.clone(),
            })
        }
    }
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledQuery({:?})", self.source.contents())
    }
}

struct UserFn {
    name: String,
    #[allow(clippy::type_complexity)]
    fcn: Box<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>,
}

fn apply_user_fn(host: &HostRef, _registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    match host.downcast_ref::<UserFn>() {
        Some(f) => (f.fcn)(args).map_err(|e| {
            log::debug!("user function {} failed: {e}", f.name);
            e
        }),
        None => Err(Error::Type("not a user function".to_string())),
    }
}

/// The query engine facade.
///
/// Owns the capability registry handle, the global variable bindings and
/// the IO policy; compiles query text into [`CompiledQuery`] values and
/// runs the solvers over them.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<CapabilityRegistry>,
    vars: BTreeMap<Arc<str>, Value>,
    allow_io: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine over the global default registry.
    pub fn new() -> Self {
        Self {
            registry: crate::registry::global(),
            vars: BTreeMap::new(),
            allow_io: false,
        }
    }

    /// An engine over an explicitly constructed registry. The registry
    /// should have the standard library's host types registered (see
    /// `builtins::register_host_types`) before first use.
    pub fn with_registry(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            vars: BTreeMap::new(),
            allow_io: false,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Allow queries to call the built-in data-source functions (csv,
    /// lines). Off by default: enabling file access from query text is a
    /// security decision the host must make explicitly.
    pub fn enable_io(&mut self, allow: bool) {
        self.allow_io = allow;
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Merge an object of bindings into the engine's variables.
    pub fn set_vars(&mut self, vars: Value) -> Result<()> {
        for (k, v) in vars.as_object()?.iter() {
            self.vars.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    /// Make a host closure callable from queries under `name`.
    pub fn register_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.registry
            .replace::<UserFn>(CapabilityImpl::Applicative(ApplicativeOps {
                apply: apply_user_fn,
            }));
        let host = HostRef::new(UserFn {
            name: name.to_string(),
            fcn: Box::new(f),
        });
        self.vars.insert(name.into(), Value::Opaque(host));
    }

    fn base_scope(&self) -> ScopeStack {
        let mut layers = vec![builtins::core::module()];
        if self.allow_io {
            #[cfg(feature = "io")]
            layers.push(builtins::io::module());
        }
        layers.push(Value::from(self.vars.clone()));
        ScopeStack::from_layers(layers)
    }

    /// Compile `text` into a reusable query. Syntax and replacement
    /// errors surface here, before any evaluation.
    pub fn compile(
        &self,
        dialect: Dialect,
        text: &str,
        replacements: Replacements,
    ) -> Result<CompiledQuery> {
        let source = Source::from_contents("<query>".to_string(), text.to_string())?;
        let binder = ParamBinder::new(replacements);

        let (root, binder) = match dialect {
            Dialect::Sql => {
                let mut parser = parser::Parser::new(&source, binder)?;
                let root = parser.parse()?;
                (root, parser.into_params())
            }
            Dialect::Lisp => {
                let mut parser = lisp::Parser::new(&source, binder)?;
                let root = parser.parse()?;
                (root, parser.into_params())
            }
        };

        let unused = binder.unused();
        if !unused.is_empty() {
            log::warn!(
                "query compiled with {} unused replacement value(s): {unused:?}",
                unused.len()
            );
        }
        log::debug!("compiled {dialect} query {text:?}");

        Ok(CompiledQuery {
            dialect,
            source,
            root,
            unused,
        })
    }

    /// Evaluate a compiled query against the engine's bindings.
    pub fn eval(&self, query: &CompiledQuery) -> Result<Value> {
        eval::eval(&query.root, &self.base_scope(), &self.registry)
    }

    /// Evaluate with extra bindings layered over the engine's.
    pub fn eval_with(&self, query: &CompiledQuery, vars: Value) -> Result<Value> {
        let scope = self.base_scope().nested(vars);
        eval::eval(&query.root, &scope, &self.registry)
    }

    /// Compile and evaluate an SQL-dialect query in one step.
    pub fn apply(&self, text: &str) -> Result<Value> {
        let query = self.compile(Dialect::Sql, text, Replacements::None)?;
        self.eval(&query)
    }

    /// Compile and evaluate with explicit dialect and replacements.
    pub fn apply_with(
        &self,
        dialect: Dialect,
        text: &str,
        replacements: Replacements,
    ) -> Result<Value> {
        let query = self.compile(dialect, text, replacements)?;
        self.eval(&query)
    }

    /// Run the filter/match solver: does `row` satisfy the query?
    pub fn matches(&self, query: &CompiledQuery, row: &Value) -> Result<bool> {
        let scope = self.base_scope().nested(row.clone());
        matcher::matches(&query.root, &scope, &self.registry)
    }

    /// Yield the rows of `data` that match the query's predicate.
    pub fn search(&self, query: &CompiledQuery, data: &[Value]) -> Result<Vec<Value>> {
        let base = self.base_scope();
        let mut out = vec![];
        for row in data {
            let scope = base.nested(row.clone());
            if matcher::matches(&query.root, &scope, &self.registry)? {
                out.push(row.clone());
            }
        }
        Ok(out)
    }
}
