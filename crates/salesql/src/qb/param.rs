//! Named parameter bag and the immutable built query.

use crate::error::{SqlError, SqlResult};
use crate::qb::placeholder;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Named bindings substituted for `:name` placeholders at execution time.
///
/// A name can only ever hold one value: rebinding it to an equal value is a
/// no-op, rebinding it to a different value is [`SqlError::AmbiguousParameter`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params {
    entries: BTreeMap<String, Value>,
}

impl Params {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`.
    ///
    /// A leading `:` on the name is accepted and ignored.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) -> SqlResult<()> {
        let name = normalize_name(name.into())?;
        let value = value.into();
        self.check(&name, &value)?;
        self.entries.insert(name, value);
        Ok(())
    }

    /// Bind every pair, or none of them if any pair conflicts.
    pub fn merge<I, K, V>(&mut self, bindings: I) -> SqlResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut staged: Vec<(String, Value)> = Vec::new();
        for (name, value) in bindings {
            let name = normalize_name(name.into())?;
            let value = value.into();
            self.check(&name, &value)?;
            if let Some((_, prev)) = staged.iter().find(|(n, _)| *n == name) {
                if *prev != value {
                    return Err(SqlError::AmbiguousParameter {
                        name,
                        existing: prev.clone(),
                        incoming: value,
                    });
                }
                continue;
            }
            staged.push((name, value));
        }
        self.entries.extend(staged);
        Ok(())
    }

    fn check(&self, name: &str, value: &Value) -> SqlResult<()> {
        match self.entries.get(name) {
            Some(existing) if existing != value => Err(SqlError::AmbiguousParameter {
                name: name.to_string(),
                existing: existing.clone(),
                incoming: value.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

fn normalize_name(name: String) -> SqlResult<String> {
    let trimmed = name.strip_prefix(':').unwrap_or(&name);
    if !placeholder::is_valid_name(trimmed) {
        return Err(SqlError::invalid_argument(format!(
            "invalid parameter name '{name}' (expected [A-Za-z_][A-Za-z0-9_]*)"
        )));
    }
    Ok(trimmed.to_string())
}

/// Finished `(sql, params)` pair produced by a builder.
///
/// Holds no reference to the builder that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuiltQuery {
    sql: String,
    params: Params,
}

impl BuiltQuery {
    pub(crate) fn new(sql: String, params: Params) -> Self {
        Self { sql, params }
    }

    /// SQL text with `:name` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn into_parts(self) -> (String, Params) {
        (self.sql, self.params)
    }

    /// Rewrite to `$1, $2, ...` placeholders with the values in index order.
    pub fn to_positional(&self) -> SqlResult<(String, Vec<Value>)> {
        placeholder::to_positional(&self.sql, &self.params)
    }
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
