//! Location of `:name` placeholders in emitted SQL.
//!
//! This is not a SQL parser: it only skips quoted literals/identifiers,
//! `--` line comments and `::` casts so that those never count as placeholders.

use crate::error::{SqlError, SqlResult};
use crate::qb::param::Params;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placeholder<'a> {
    /// Byte offset of the `:`.
    pub start: usize,
    /// Byte offset one past the last name character.
    pub end: usize,
    pub name: &'a str,
}

fn is_name_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_name_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Whether `name` is usable as a placeholder name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.split_first() {
        Some((first, rest)) => is_name_start(*first) && rest.iter().all(|b| is_name_char(*b)),
        None => false,
    }
}

/// Every placeholder occurrence, in text order.
pub(crate) fn scan(sql: &str) -> Vec<Placeholder<'_>> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < len {
                    if bytes[i] == quote {
                        // Doubled quote is an escaped quote.
                        if i + 1 < len && bytes[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b':' => {
                if i + 1 < len && bytes[i + 1] == b':' {
                    i += 2;
                    continue;
                }
                if i + 1 < len && is_name_start(bytes[i + 1]) {
                    let start = i;
                    i += 1;
                    while i < len && is_name_char(bytes[i]) {
                        i += 1;
                    }
                    out.push(Placeholder {
                        start,
                        end: i,
                        name: &sql[start + 1..i],
                    });
                    continue;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

/// Distinct placeholder names in first-appearance order.
pub(crate) fn names(sql: &str) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for ph in scan(sql) {
        if !seen.contains(&ph.name) {
            seen.push(ph.name);
        }
    }
    seen
}

/// Require a one-to-one match between placeholders and bindings.
pub(crate) fn check_bindings(sql: &str, params: &Params) -> SqlResult<()> {
    let used = names(sql);
    if let Some(missing) = used.iter().find(|n| !params.contains(n)) {
        return Err(SqlError::UnboundParameter((*missing).to_string()));
    }
    if let Some(unused) = params.names().find(|n| !used.contains(n)) {
        return Err(SqlError::UnusedParameter(unused.to_string()));
    }
    Ok(())
}

/// Rewrite `:name` placeholders as `$n`.
///
/// Indices follow first appearance; a name used twice reuses its index.
pub(crate) fn to_positional(sql: &str, params: &Params) -> SqlResult<(String, Vec<Value>)> {
    check_bindings(sql, params)?;

    let mut out = String::with_capacity(sql.len());
    let mut values: Vec<Value> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut last = 0;

    for ph in scan(sql) {
        out.push_str(&sql[last..ph.start]);
        let idx = match index.get(ph.name) {
            Some(idx) => *idx,
            None => {
                let value = params
                    .get(ph.name)
                    .ok_or_else(|| SqlError::UnboundParameter(ph.name.to_string()))?;
                values.push(value.clone());
                index.insert(ph.name, values.len());
                values.len()
            }
        };
        let _ = write!(&mut out, "${idx}");
        last = ph.end;
    }
    out.push_str(&sql[last..]);

    Ok((out, values))
}
