//! Type conversion between Tabula values and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};
use tabula_query::{BoundParam, RawValue, Value};

/// Convert a bound parameter to a SQLite value.
///
/// Booleans are stored as integers and raw JSON as text.
pub fn to_sqlite(param: &BoundParam) -> SqlValue {
    match &param.value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) | Value::Json(s) => SqlValue::Text(s.clone()),
    }
}

/// Convert a fetched SQLite cell to a raw value.
pub fn from_sqlite(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => RawValue::Null,
        ValueRef::Integer(i) => RawValue::Integer(i),
        ValueRef::Real(f) => RawValue::Real(f),
        ValueRef::Text(bytes) => RawValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RawValue::Blob(bytes.to_vec()),
    }
}
