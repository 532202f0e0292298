//! Bindable and decodable SQL values.
//!
//! [`Value`] is the single currency of the parameter bag and of result rows:
//! it compares by value (so rebinding a name can be checked for ambiguity),
//! serializes to plain JSON, and maps onto PostgreSQL types in both directions.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

type BoxError = Box<dyn Error + Sync + Send>;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a calendar date (text must be `YYYY-MM-DD`).
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Interpret the value as a point in time; dates map to midnight.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp(s)
                .or_else(|| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok().map(|d| d.and_time(NaiveTime::MIN))),
            _ => None,
        }
    }

    /// Compare two values of compatible kinds.
    ///
    /// Numbers compare numerically, date-like values (dates, timestamps and
    /// text that parses as either) chronologically, other text lexically.
    /// Returns `None` when the kinds cannot be ordered against each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => match (self.as_datetime(), other.as_datetime()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(a.cmp(b)),
            },
            (
                Value::Date(_) | Value::Timestamp(_) | Value::Text(_),
                Value::Date(_) | Value::Timestamp(_) | Value::Text(_),
            ) => Some(self.as_datetime()?.cmp(&other.as_datetime()?)),
            _ => None,
        }
    }

    /// Best-effort typing of a textual argument (CLI flags, env values).
    pub fn infer(raw: &str) -> Value {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if let Ok(b) = s.parse::<bool>() {
            return Value::Bool(b);
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
            return Value::Date(d);
        }
        if let Some(ts) = parse_timestamp(s) {
            return Value::Timestamp(ts);
        }
        Value::Text(raw.to_string())
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Encode `value` only if its Rust type maps onto the column type.
fn encode<T: ToSql>(value: &T, ty: &Type, out: &mut BytesMut, kind: &str) -> Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(format!("cannot bind {kind} value to column of type {ty}").into());
    }
    value.to_sql(ty, out)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let kind = self.kind();
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => encode(v, ty, out, kind),
            Value::Int(v) => match *ty {
                Type::INT2 => encode(&i16::try_from(*v)?, ty, out, kind),
                Type::INT4 => encode(&i32::try_from(*v)?, ty, out, kind),
                Type::FLOAT4 => encode(&(*v as f32), ty, out, kind),
                Type::FLOAT8 => encode(&(*v as f64), ty, out, kind),
                Type::NUMERIC => encode(&Decimal::from(*v), ty, out, kind),
                _ => encode(v, ty, out, kind),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => encode(&(*v as f32), ty, out, kind),
                Type::NUMERIC => encode(&Decimal::try_from(*v)?, ty, out, kind),
                _ => encode(v, ty, out, kind),
            },
            Value::Text(s) => match *ty {
                Type::DATE => {
                    let d = NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?;
                    encode(&d, ty, out, kind)
                }
                Type::TIMESTAMP | Type::TIMESTAMPTZ => {
                    let ts = self
                        .as_datetime()
                        .ok_or_else(|| format!("cannot parse '{s}' as a timestamp"))?;
                    Value::Timestamp(ts).to_sql(ty, out)
                }
                _ => encode(s, ty, out, kind),
            },
            Value::Date(d) => match *ty {
                Type::TIMESTAMP | Type::TIMESTAMPTZ => {
                    Value::Timestamp(d.and_time(NaiveTime::MIN)).to_sql(ty, out)
                }
                _ => encode(d, ty, out, kind),
            },
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => encode(&Utc.from_utc_datetime(ts), ty, out, kind),
                Type::DATE => encode(&ts.date(), ty, out, kind),
                _ => encode(ts, ty, out, kind),
            },
        }
    }

    fn accepts(ty: &Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f32 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <Decimal as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <NaiveDate as ToSql>::accepts(ty)
            || <NaiveDateTime as ToSql>::accepts(ty)
            || <DateTime<Utc> as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i64::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => Value::Int(i64::from(i32::from_sql(ty, raw)?)),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::FLOAT4 => Value::Float(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => {
                let d = Decimal::from_sql(ty, raw)?;
                Value::Float(d.to_f64().ok_or_else(|| format!("numeric {d} out of f64 range"))?)
            }
            Type::DATE => Value::Date(NaiveDate::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc()),
            _ if <String as FromSql>::accepts(ty) => Value::Text(String::from_sql(ty, raw)?),
            _ => return Err(format!("unsupported column type: {ty}").into()),
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::DATE
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
        ) || <String as FromSql>::accepts(ty)
    }
}
