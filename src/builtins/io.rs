// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::{BuiltinFcn, StdFn};
use crate::errors::{Error, Result};
use crate::registry::{CapabilityImpl, CapabilityRegistry, RepeatedOps};
use crate::value::{HostRef, Value};

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;

use lazy_static::lazy_static;

#[rustfmt::skip]
const FUNCTIONS: &[(&str, BuiltinFcn)] = &[
    ("csv",   csv_fn),
    ("lines", lines_fn),
];

lazy_static! {
    static ref MODULE: Value = {
	let mut m: BTreeMap<Arc<str>, Value> = BTreeMap::new();
	for &(name, fcn) in FUNCTIONS {
	    m.insert(name.into(), Value::Opaque(HostRef::new(StdFn { name, fcn })));
	}
	Value::from(m)
    };
}

/// The IO module. Only pushed into scope when the engine has IO enabled,
/// so queries cannot open files unless the host explicitly opted in.
pub fn module() -> Value {
    MODULE.clone()
}

pub fn register_host_types(registry: &CapabilityRegistry) {
    if let Err(e) =
        registry.register::<LazyCsv>(CapabilityImpl::Repeated(RepeatedOps { values: csv_values }))
    {
        log::warn!("io registration: {e}");
    }
    if let Err(e) = registry
        .register::<LazyLines>(CapabilityImpl::Repeated(RepeatedOps { values: line_values }))
    {
        log::warn!("io registration: {e}");
    }
}

/// A delimited-text data source. The file is opened each time the value
/// is iterated, so the sequence is lazy and restartable and never fully
/// resident in memory.
pub struct LazyCsv {
    path: String,
    decode_header: bool,
}

/// A line-oriented text data source; same laziness contract as `LazyCsv`.
pub struct LazyLines {
    path: String,
}

/// csv(path[, decode_header]): rows of the file at `path`.
///
/// With `decode_header`, the first row names the columns and each row
/// becomes an object; otherwise rows are arrays of strings.
fn csv_fn(_registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::Arity {
            name: "csv".to_string(),
            expected: 1,
            got: args.len(),
        });
    }
    let path = args[0].as_str()?.to_string();
    let decode_header = args.get(1).map(Value::truthy).unwrap_or(false);
    log::trace!("csv source: {path}");
    Ok(Value::Opaque(HostRef::new(LazyCsv {
        path,
        decode_header,
    })))
}

/// lines(path): the lines of the text file at `path`, as strings.
fn lines_fn(_registry: &CapabilityRegistry, args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(Error::Arity {
            name: "lines".to_string(),
            expected: 1,
            got: args.len(),
        });
    }
    let path = args[0].as_str()?.to_string();
    log::trace!("lines source: {path}");
    Ok(Value::Opaque(HostRef::new(LazyLines { path })))
}

fn csv_values(host: &HostRef) -> Result<Box<dyn Iterator<Item = Result<Value>> + Send>> {
    let source = host
        .downcast_ref::<LazyCsv>()
        .ok_or_else(|| Error::Type("not a csv source".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(source.decode_header)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(&source.path)
        .map_err(|e| Error::Type(format!("cannot open {}: {e}", source.path)))?;

    let header: Option<Vec<Arc<str>>> = if source.decode_header {
        let names = reader
            .headers()
            .map_err(|e| Error::Type(format!("cannot read {}: {e}", source.path)))?;
        Some(names.iter().map(Into::into).collect())
    } else {
        None
    };

    Ok(Box::new(reader.into_records().map(move |record| {
        let record = record.map_err(|e| Error::Type(format!("csv read error: {e}")))?;
        Ok(match &header {
            Some(columns) => {
                let mut row: BTreeMap<Arc<str>, Value> = BTreeMap::new();
                for (idx, field) in record.iter().enumerate() {
                    if let Some(column) = columns.get(idx) {
                        row.insert(column.clone(), Value::from(field));
                    }
                }
                Value::from(row)
            }
            None => Value::from(record.iter().map(Value::from).collect::<Vec<_>>()),
        })
    })))
}

fn line_values(host: &HostRef) -> Result<Box<dyn Iterator<Item = Result<Value>> + Send>> {
    let source = host
        .downcast_ref::<LazyLines>()
        .ok_or_else(|| Error::Type("not a lines source".to_string()))?;

    let file = std::fs::File::open(&source.path)
        .map_err(|e| Error::Type(format!("cannot open {}: {e}", source.path)))?;
    let reader = std::io::BufReader::new(file);

    Ok(Box::new(reader.lines().map(|line| {
        line.map(Value::from)
            .map_err(|e| Error::Type(format!("read error: {e}")))
    })))
}
