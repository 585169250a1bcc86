//! Column values and parameter binding.
//!
//! [`Value`] is the closed set of kinds a record may hold. The binder picks a
//! [`PlaceholderKind`] for each value from its runtime type and pairs the two
//! in a [`BoundParam`], so placeholders and parameters always travel together.
//!
//! ```rust
//! use tabula_query::value::{infer_param, PlaceholderKind, Value};
//!
//! let p = infer_param(&Value::from("42"), false).unwrap();
//! assert_eq!(p.kind, PlaceholderKind::Integer);
//! assert_eq!(p.value, Value::Int(42));
//!
//! let p = infer_param(&Value::from(true), false).unwrap();
//! assert_eq!(p.kind, PlaceholderKind::Integer);
//!
//! // Raw JSON cannot be compared against; the condition is dropped.
//! assert!(infer_param(&Value::Json("{}".into()), false).is_none());
//! ```

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
    /// Already-serialized JSON text, stored verbatim.
    Json(String),
}

impl Value {
    /// Check if this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the text content, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content, accepting integral floats and numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Name of the value's kind, for messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Json(_) => "json",
        }
    }

    /// Convert to a JSON value. Raw JSON text is parsed back into structure.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Json(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.clone()))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) | Self::Json(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// The kind of placeholder a parameter is bound through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// Text placeholder.
    Text,
    /// Integer placeholder.
    Integer,
    /// Float placeholder.
    Float,
    /// Boolean placeholder, only where the dialect supports one.
    Boolean,
}

/// A parameter paired with the placeholder kind it was rendered for.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Placeholder kind.
    pub kind: PlaceholderKind,
    /// The value to bind. `Value::Null` binds as SQL NULL.
    pub value: Value,
}

impl BoundParam {
    /// Create a bound parameter.
    pub fn new(kind: PlaceholderKind, value: impl Into<Value>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// A text parameter.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(PlaceholderKind::Text, Value::Text(value.into()))
    }
}

/// Classify a string that holds nothing but a decimal number.
///
/// Leading zeros ("007") stay text so that identifiers such as postal codes
/// keep comparing as strings.
fn numeric_text(s: &str) -> Option<Value> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if digits.matches('.').count() > 1 || digits.starts_with('.') || digits.ends_with('.') {
        return None;
    }
    let int_part = digits.split('.').next().unwrap_or(digits);
    if int_part.len() > 1 && int_part.starts_with('0') {
        return None;
    }
    if digits.contains('.') {
        s.parse::<f64>().ok().map(Value::Float)
    } else {
        s.parse::<i64>().ok().map(Value::Int)
    }
}

/// Infer the placeholder for a comparison value.
///
/// Strings bind as text unless purely numeric, booleans bind through the
/// boolean placeholder when `bool_placeholder` is set and as integer 0/1
/// otherwise. NULL, raw JSON and non-finite floats have no comparison
/// placeholder and yield `None`.
pub fn infer_param(value: &Value, bool_placeholder: bool) -> Option<BoundParam> {
    match value {
        Value::Text(s) => Some(match numeric_text(s) {
            Some(v @ Value::Int(_)) => BoundParam::new(PlaceholderKind::Integer, v),
            Some(v) => BoundParam::new(PlaceholderKind::Float, v),
            None => BoundParam::text(s.clone()),
        }),
        Value::Int(i) => Some(BoundParam::new(PlaceholderKind::Integer, *i)),
        Value::Float(f) if f.is_finite() => Some(BoundParam::new(PlaceholderKind::Float, *f)),
        Value::Bool(b) if bool_placeholder => Some(BoundParam::new(PlaceholderKind::Boolean, *b)),
        Value::Bool(b) => Some(BoundParam::new(PlaceholderKind::Integer, i64::from(*b))),
        Value::Float(_) | Value::Null | Value::Json(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_infer_plain_text() {
        let p = infer_param(&Value::from("socks"), false).unwrap();
        assert_eq!(p.kind, PlaceholderKind::Text);
        assert_eq!(p.value, Value::from("socks"));
    }

    #[test]
    fn test_infer_numeric_text() {
        let p = infer_param(&Value::from("-12"), false).unwrap();
        assert_eq!(p, BoundParam::new(PlaceholderKind::Integer, -12i64));

        let p = infer_param(&Value::from("9.95"), false).unwrap();
        assert_eq!(p, BoundParam::new(PlaceholderKind::Float, 9.95));
    }

    #[test]
    fn test_infer_ambiguous_text_stays_text() {
        for s in ["007", "1e5", "1.2.3", "12 ", "", "-", ".5", "5."] {
            let p = infer_param(&Value::from(s), false).unwrap();
            assert_eq!(p.kind, PlaceholderKind::Text, "{s:?}");
        }
    }

    #[test]
    fn test_infer_bool() {
        let p = infer_param(&Value::Bool(true), false).unwrap();
        assert_eq!(p, BoundParam::new(PlaceholderKind::Integer, 1i64));

        let p = infer_param(&Value::Bool(false), true).unwrap();
        assert_eq!(p, BoundParam::new(PlaceholderKind::Boolean, false));
    }

    #[test]
    fn test_infer_unsupported() {
        assert!(infer_param(&Value::Null, false).is_none());
        assert!(infer_param(&Value::Json("[1]".into()), false).is_none());
        assert!(infer_param(&Value::Float(f64::NAN), false).is_none());
    }

    #[test]
    fn test_json_value_serializes_structurally() {
        let v = Value::Json(r#"{"a":1}"#.into());
        assert_eq!(serde_json::to_value(&v).unwrap(), serde_json::json!({"a": 1}));
    }
}
