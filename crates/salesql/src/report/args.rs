use crate::error::{SqlError, SqlResult};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Keyword arguments passed to [`ReportFactory::create`](super::ReportFactory::create).
///
/// `Null` counts as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReportArgs {
    values: BTreeMap<String, Value>,
}

impl ReportArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Parse a `key=value` pair (CLI style); the value type is inferred.
    pub fn insert_pair(&mut self, pair: &str) -> SqlResult<()> {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(SqlError::invalid_argument(format!(
                "expected key=value, got '{pair}'"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(SqlError::invalid_argument(format!(
                "missing argument name in '{pair}'"
            )));
        }
        self.insert(key, Value::infer(raw));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // ==================== Typed access ====================

    /// A calendar date or timestamp; ISO-8601 text is parsed.
    pub fn date(&self, name: &str) -> SqlResult<Option<Value>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Date(_) | Value::Timestamp(_) => Some(value.clone()),
            Value::Text(_) => value
                .as_date()
                .map(Value::Date)
                .or_else(|| value.as_datetime().map(Value::Timestamp)),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            SqlError::invalid_argument(format!(
                "'{name}' must be a date (YYYY-MM-DD), got {value}"
            ))
        })
    }

    /// An integer; numeric text is parsed.
    pub fn int(&self, name: &str) -> SqlResult<Option<i64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Int(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            SqlError::invalid_argument(format!("'{name}' must be an integer, got {value}"))
        })
    }

    pub fn text(&self, name: &str) -> SqlResult<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(SqlError::invalid_argument(format!(
                "'{name}' must be text, got {other}"
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ReportArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = ReportArgs::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn null_counts_as_absent() {
        let args = ReportArgs::new().with("start_date", Value::Null);
        assert!(!args.contains("start_date"));
        assert_eq!(args.date("start_date").unwrap(), None);
    }

    #[test]
    fn text_dates_are_parsed() {
        let args = ReportArgs::new().with("start_date", "2024-01-15");
        assert_eq!(
            args.date("start_date").unwrap(),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
        );
    }

    #[test]
    fn bad_date_names_the_field() {
        let args = ReportArgs::new().with("end_date", 20240115);
        let err = args.date("end_date").unwrap_err();
        assert!(matches!(err, SqlError::InvalidArgument(ref m) if m.contains("end_date")));
    }

    #[test]
    fn int_accepts_numeric_text() {
        let args: ReportArgs = [("limit", "25")].into_iter().collect();
        assert_eq!(args.int("limit").unwrap(), Some(25));
        let args = ReportArgs::new().with("limit", "ten");
        assert!(args.int("limit").is_err());
    }

    #[test]
    fn pairs_infer_types() {
        let mut args = ReportArgs::new();
        args.insert_pair("category_id=5").unwrap();
        args.insert_pair("granularity=month").unwrap();
        assert_eq!(args.get("category_id"), Some(&Value::Int(5)));
        assert_eq!(args.text("granularity").unwrap(), Some("month"));
        assert!(args.insert_pair("nonsense").is_err());
        assert!(args.insert_pair("=5").is_err());
    }
}
