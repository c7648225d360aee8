// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::{Error, Result};
use crate::value::Value;

use std::collections::{HashMap, HashSet};

/// Replacement values for `?` (positional) and `{name}` (named)
/// placeholders.
///
/// Replacement values are spliced into the compiled query as literal AST
/// nodes and are never lexed or parsed as syntax, so a value may contain
/// quotes, keywords or operator characters without changing the query's
/// structure.
#[derive(Debug, Clone, Default)]
pub enum Replacements {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl Replacements {
    pub fn positional(values: Vec<Value>) -> Self {
        Replacements::Positional(values)
    }

    pub fn named<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Replacements::Named(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn len(&self) -> usize {
        match self {
            Replacements::None => 0,
            Replacements::Positional(v) => v.len(),
            Replacements::Named(m) => m.len(),
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            Replacements::None => vec![],
            Replacements::Positional(v) => (0..v.len()).map(|i| i.to_string()).collect(),
            Replacements::Named(m) => m.keys().cloned().collect(),
        }
    }
}

/// Hands replacement values to a dialect parser as it encounters parameter
/// tokens, and tracks which values were consumed.
#[derive(Debug, Clone)]
pub struct ParamBinder {
    replacements: Replacements,
    next_index: usize,
    used: HashSet<String>,
}

impl ParamBinder {
    pub fn new(replacements: Replacements) -> Self {
        Self {
            replacements,
            next_index: 0,
            used: HashSet::new(),
        }
    }

    /// Resolve the parameter token text: empty or `?` auto-indexes, digits
    /// select a position, anything else selects by name.
    pub fn lookup(&mut self, raw: &str) -> Result<Value> {
        if raw.is_empty() || raw == "?" {
            let idx = self.next_index;
            self.next_index += 1;
            return self.positional(idx);
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            let idx: usize = raw
                .parse()
                .map_err(|_| Error::UnboundReplacement { param: raw.into() })?;
            self.next_index = idx + 1;
            return self.positional(idx);
        }
        self.named(raw)
    }

    fn positional(&mut self, idx: usize) -> Result<Value> {
        let value = match &self.replacements {
            Replacements::Positional(values) => values.get(idx).cloned(),
            _ => None,
        };
        match value {
            Some(v) => {
                self.used.insert(idx.to_string());
                Ok(v)
            }
            None => Err(Error::UnboundReplacement {
                param: idx.to_string(),
            }),
        }
    }

    fn named(&mut self, name: &str) -> Result<Value> {
        let value = match &self.replacements {
            Replacements::Named(values) => values.get(name).cloned(),
            _ => None,
        };
        match value {
            Some(v) => {
                self.used.insert(name.to_string());
                Ok(v)
            }
            None => Err(Error::UnboundReplacement { param: name.into() }),
        }
    }

    /// Names/positions of supplied values no placeholder consumed.
    /// Over-supplying is legal; callers may treat this as an error via
    /// [`ParamBinder::ensure_all_used`].
    pub fn unused(&self) -> Vec<String> {
        let mut unused: Vec<String> = self
            .replacements
            .keys()
            .into_iter()
            .filter(|k| !self.used.contains(k))
            .collect();
        unused.sort();
        unused
    }

    pub fn ensure_all_used(&self) -> Result<()> {
        let names = self.unused();
        if names.is_empty() {
            Ok(())
        } else {
            Err(Error::UnusedReplacement {
                count: names.len(),
                names,
            })
        }
    }

    pub fn supplied(&self) -> usize {
        self.replacements.len()
    }
}
