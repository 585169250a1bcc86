//! Records and the mapping between rows, JSON input and bound parameters.
//!
//! A [`Record`] is an ordered `column -> value` map. Records are built from
//! caller input at the boundary ([`Record::from_json`]) or from fetched rows
//! ([`Record::from_row`]), and turned back into parameters with
//! [`bind_write_value`].
//!
//! ```rust
//! use tabula_query::record::Record;
//! use tabula_query::value::Value;
//!
//! let input = serde_json::json!({
//!     "title": "Wool socks",
//!     "price": 12,
//!     "meta": {"color": "red"},
//!     "archived_at": null,
//! });
//!
//! let record = Record::from_json(input.as_object().unwrap().clone()).unwrap();
//! assert_eq!(record.get("price"), Some(&Value::Int(12)));
//! assert_eq!(record.get("meta"), Some(&Value::Json(r#"{"color":"red"}"#.into())));
//! assert_eq!(record.get("archived_at"), Some(&Value::Null));
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::driver::{RawRow, RawValue};
use crate::error::DataError;
use crate::schema::ColumnSet;
use crate::value::{BoundParam, PlaceholderKind, Value};

/// An ordered mapping of column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field (builder style).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(column.into(), value.into())
    }

    /// Explicitly set a field to SQL NULL.
    pub fn set_null(&mut self, column: impl Into<String>) {
        self.fields.insert(column.into(), Value::Null);
    }

    /// Get a field.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Remove a field.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.shift_remove(column)
    }

    /// Check whether a field is present.
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// The `id` field, when present and non-null.
    pub fn id(&self) -> Option<&Value> {
        self.get("id").filter(|v| !v.is_null())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Keep only fields whose column exists in `columns`.
    ///
    /// Returns the names of the dropped fields.
    pub fn retain_columns(&mut self, columns: &ColumnSet) -> Vec<String> {
        let mut dropped = Vec::new();
        self.fields.retain(|k, _| {
            let keep = columns.contains(k);
            if !keep {
                dropped.push(k.clone());
            }
            keep
        });
        dropped
    }

    /// Overlay this record's fields on top of `base`.
    pub fn merged_over(self, base: &Record) -> Record {
        let mut merged = base.clone();
        for (k, v) in self.fields {
            merged.fields.insert(k, v);
        }
        merged
    }

    /// Build a record from caller-supplied JSON.
    ///
    /// Objects and arrays are stored as raw JSON text. Strings that already
    /// contain a JSON object or array pass through verbatim rather than being
    /// escaped a second time.
    pub fn from_json(object: Map<String, JsonValue>) -> Result<Self, DataError> {
        let mut record = Record::new();
        for (column, value) in object {
            let value = json_to_value(&column, value)?;
            record.fields.insert(column, value);
        }
        Ok(record)
    }

    /// Map a fetched row into a record.
    pub fn from_row(row: RawRow) -> Self {
        let fields = row
            .columns
            .into_iter()
            .zip(row.values)
            .map(|(column, raw)| (column, raw_to_value(raw)))
            .collect();
        Self { fields }
    }

    /// Convert to a JSON object.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

fn looks_like_json(s: &str) -> bool {
    let t = s.trim();
    (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']'))
}

fn json_to_value(column: &str, value: JsonValue) -> Result<Value, DataError> {
    Ok(match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                return Err(DataError::validation(column, "number out of range"));
            }
        }
        JsonValue::String(s) => {
            if looks_like_json(&s) && serde_json::from_str::<JsonValue>(&s).is_ok() {
                Value::Json(s)
            } else {
                Value::Text(s)
            }
        }
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Json(nested.to_string()),
    })
}

fn raw_to_value(raw: RawValue) -> Value {
    match raw {
        RawValue::Null => Value::Null,
        RawValue::Integer(i) => Value::Int(i),
        RawValue::Real(f) => Value::Float(f),
        RawValue::Text(s) => {
            if looks_like_json(&s) && serde_json::from_str::<JsonValue>(&s).is_ok() {
                Value::Json(s)
            } else {
                Value::Text(s)
            }
        }
        RawValue::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Bind a value being written by INSERT or UPDATE.
///
/// NULL binds as a real SQL NULL and raw JSON binds as its text, untouched.
/// Text is never reinterpreted on the write path.
pub fn bind_write_value(value: &Value, bool_placeholder: bool) -> BoundParam {
    match value {
        Value::Null => BoundParam::new(PlaceholderKind::Text, Value::Null),
        Value::Bool(b) if bool_placeholder => BoundParam::new(PlaceholderKind::Boolean, *b),
        Value::Bool(b) => BoundParam::new(PlaceholderKind::Integer, i64::from(*b)),
        Value::Int(i) => BoundParam::new(PlaceholderKind::Integer, *i),
        Value::Float(f) if f.is_finite() => BoundParam::new(PlaceholderKind::Float, *f),
        Value::Float(_) => BoundParam::new(PlaceholderKind::Float, Value::Null),
        Value::Text(s) => BoundParam::text(s.clone()),
        Value::Json(raw) => BoundParam::new(PlaceholderKind::Text, Value::Json(raw.clone())),
    }
}
