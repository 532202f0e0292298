//! Result rows decoded into [`Value`]s.

use crate::error::{SqlError, SqlResult};
use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio_postgres::Row;

/// One result row: column name → value, in select-list order.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every column of a driver row.
    pub fn from_row(row: &Row) -> SqlResult<Self> {
        let mut fields = Vec::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let value: Value = row
                .try_get(idx)
                .map_err(|e| SqlError::decode(column.name(), e.to_string()))?;
            fields.push((column.name().to_string(), value));
        }
        Ok(Self { fields })
    }

    /// Set `column`, replacing an existing value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Typed lookup; a missing column is a decode error.
    pub fn require(&self, column: &str) -> SqlResult<&Value> {
        self.get(column)
            .ok_or_else(|| SqlError::decode(column, "column not present in result"))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_column_order_and_replaces_in_place() {
        let mut r: Record = [("b", Value::Int(1)), ("a", Value::Int(2))].into_iter().collect();
        r.insert("b", 3);
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(r.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn serializes_as_ordered_object() {
        let r: Record = [("z", Value::from("x")), ("a", Value::Null)].into_iter().collect();
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"z":"x","a":null}"#);
    }

    #[test]
    fn require_reports_missing_column() {
        let r = Record::new();
        assert!(matches!(r.require("total"), Err(SqlError::Decode { ref column, .. }) if column == "total"));
    }
}
