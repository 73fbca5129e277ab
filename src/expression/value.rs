//! Literal and tuple values.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Cardinality, FieldType};

/// A typed value: an expression literal or one cell of a result tuple.
///
/// Equality and hashing are structural; floats compare by bit pattern so
/// that expressions can be used as map keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Object(serde_json::Map<String, serde_json::Value>),
}

impl Value {
    /// Short name of this value's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to a JSON value (dates as `YYYY-MM-DD`, timestamps as RFC 3339).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(map.clone()),
        }
    }

    /// Coerce a raw JSON value to the declared type of a field.
    ///
    /// Returns a description of the mismatch on failure.
    pub fn from_json(
        json: &serde_json::Value,
        field_type: &FieldType,
        cardinality: Cardinality,
    ) -> Result<Value, String> {
        if json.is_null() {
            return if cardinality.allows_absence() {
                Ok(Value::Null)
            } else {
                Err(format!("null value for {} field", field_type))
            };
        }
        if cardinality.is_list() {
            let items = json
                .as_array()
                .ok_or_else(|| format!("expected list of {}, got {}", field_type, json_kind(json)))?;
            return items
                .iter()
                .map(|item| Value::from_json(item, field_type, Cardinality::Required))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List);
        }
        Self::scalar_from_json(json, field_type)
    }

    fn scalar_from_json(json: &serde_json::Value, field_type: &FieldType) -> Result<Value, String> {
        let mismatch = || format!("expected {}, got {}", field_type, json_kind(json));
        match field_type {
            FieldType::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
            FieldType::Integer => json.as_i64().map(Value::Integer).ok_or_else(mismatch),
            FieldType::Float => json.as_f64().map(Value::Float).ok_or_else(mismatch),
            FieldType::Text => json
                .as_str()
                .map(|s| Value::Text(s.to_string()))
                .ok_or_else(mismatch),
            FieldType::Enum(variants) => match json.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(Value::Text(s.to_string())),
                Some(s) => Err(format!("'{}' is not a variant of {}", s, field_type)),
                None => Err(mismatch()),
            },
            FieldType::Date => json
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(Value::Date)
                .ok_or_else(mismatch),
            FieldType::Timestamp => json
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .ok_or_else(mismatch),
            FieldType::Object(_) => json
                .as_object()
                .map(|o| Value::Object(o.clone()))
                .ok_or_else(mismatch),
            FieldType::Map => {
                let entries = json.as_object().ok_or_else(mismatch)?;
                if let Some((key, value)) = entries.iter().find(|(_, v)| !v.is_string()) {
                    return Err(format!("map key '{}' holds {}, expected text", key, json_kind(value)));
                }
                Ok(Value::Object(entries.clone()))
            }
        }
    }

    /// Compare two values of compatible kinds. Integers widen to floats.
    ///
    /// Returns `None` for incomparable kinds (including nulls).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Semantic equality used when evaluating predicates (numeric widening).
    pub fn matches(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::List(items) => items.hash(state),
            // Map iteration order is deterministic, so the rendered form is stable.
            Value::Object(map) => serde_json::Value::Object(map.clone()).to_string().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Date(d) => write!(f, "DATE '{}'", d.format("%Y-%m-%d")),
            Value::Timestamp(t) => write!(f, "TIMESTAMP '{}'", t.to_rfc3339()),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Object(map) => write!(f, "{}", serde_json::Value::Object(map.clone())),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_float_structural_equality() {
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
        assert_ne!(Value::Float(1.0), Value::Integer(1));

        let mut set = HashSet::new();
        set.insert(Value::Float(0.1));
        assert!(set.contains(&Value::Float(0.1)));
    }

    #[test]
    fn test_numeric_widening_compare() {
        assert_eq!(Value::Integer(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert!(Value::Integer(3).matches(&Value::Float(3.0)));
        assert_eq!(Value::Text("a".into()).compare(&Value::Integer(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_from_json_scalars() {
        let v = Value::from_json(&json!(42), &FieldType::Integer, Cardinality::Required).unwrap();
        assert_eq!(v, Value::Integer(42));

        let v = Value::from_json(&json!(42), &FieldType::Float, Cardinality::Required).unwrap();
        assert_eq!(v, Value::Float(42.0));

        let err = Value::from_json(&json!("x"), &FieldType::Integer, Cardinality::Required);
        assert_eq!(err.unwrap_err(), "expected integer, got string");
    }

    #[test]
    fn test_from_json_null_and_lists() {
        let nullable = Value::from_json(&json!(null), &FieldType::Text, Cardinality::Nullable);
        assert_eq!(nullable.unwrap(), Value::Null);

        let required = Value::from_json(&json!(null), &FieldType::Text, Cardinality::Required);
        assert!(required.is_err());

        let list = Value::from_json(&json!(["a", "b"]), &FieldType::Text, Cardinality::List).unwrap();
        assert_eq!(list, Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_from_json_dates_and_enums() {
        let date = Value::from_json(&json!("2024-02-29"), &FieldType::Date, Cardinality::Required).unwrap();
        assert_eq!(date, Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));

        let colors = FieldType::Enum(vec!["RED".into(), "BLUE".into()]);
        assert!(Value::from_json(&json!("RED"), &colors, Cardinality::Required).is_ok());
        assert!(Value::from_json(&json!("PINK"), &colors, Cardinality::Required).is_err());
    }

    #[test]
    fn test_to_json_roundtrip_types() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(date.to_json(), json!("2020-01-02"));
        assert_eq!(Value::from(Some(3)).to_json(), json!(3));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_display_escapes_text() {
        assert_eq!(Value::Text("O'Hara".into()).to_string(), "'O''Hara'");
    }
}
