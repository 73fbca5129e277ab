//! Result tuples and typed column access.
//!
//! A [`Tuple`] is one projected row with positionally typed access. Typed
//! Rust tuples `(T1, .., Tk)` are read from it through [`FromTuple`], which
//! is generated for every arity from 1 to 8 by one macro, as is
//! [`MapperFunction`] for closures of the same arities.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use super::error::{QueryError, QueryResult};
use crate::catalog::{Cardinality, FieldType};
use crate::expression::{ExpressionError, ExpressionResult, Path, ProjectedField, Projection, Value};

/// One projected row.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    row: usize,
    columns: Arc<[Path]>,
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(row: usize, columns: Arc<[Path]>, values: Vec<Value>) -> Self {
        Self { row, columns, values }
    }

    /// Position of this row in the backend's result order.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Projected path of column `index`.
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.columns.get(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Typed access to column `index`.
    pub fn get<T: FromValue>(&self, index: usize) -> QueryResult<T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| self.error(index, format!("no column {} in a {}-tuple", index, self.arity())))?;
        T::from_value(value.clone()).map_err(|reason| self.error(index, reason))
    }

    fn error(&self, index: usize, reason: String) -> QueryError {
        QueryError::ProjectionExtraction {
            row: self.row,
            path: self
                .columns
                .get(index)
                .map(|p| p.to_string())
                .unwrap_or_else(|| format!("#{}", index)),
            reason,
        }
    }
}

/// Conversion from a tuple cell.
pub trait FromValue: Sized {
    /// Check if a column of this field type can be read as `Self`.
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool;

    fn from_value(value: Value) -> Result<Self, String>;
}

fn unexpected<T>(expected: &str, value: &Value) -> Result<T, String> {
    Err(format!("expected {}, got {}", expected, value.kind_name()))
}

impl FromValue for Value {
    fn accepts(_: &FieldType, _: Cardinality) -> bool {
        true
    }

    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

impl FromValue for serde_json::Value {
    fn accepts(_: &FieldType, _: Cardinality) -> bool {
        true
    }

    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value.to_json())
    }
}

impl FromValue for bool {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required && *field_type == FieldType::Boolean
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => unexpected("boolean", &other),
        }
    }
}

impl FromValue for i64 {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required && *field_type == FieldType::Integer
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Integer(n) => Ok(n),
            other => unexpected("integer", &other),
        }
    }
}

impl FromValue for i32 {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        i64::accepts(field_type, cardinality)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        let n = i64::from_value(value)?;
        i32::try_from(n).map_err(|_| format!("{} out of range for i32", n))
    }
}

impl FromValue for f64 {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required && field_type.is_numeric()
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(n) => Ok(n as f64),
            other => unexpected("float", &other),
        }
    }
}

impl FromValue for String {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required
            && matches!(field_type, FieldType::Text | FieldType::Enum(_))
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s),
            other => unexpected("text", &other),
        }
    }
}

impl FromValue for NaiveDate {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required && *field_type == FieldType::Date
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(d),
            other => unexpected("date", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required && *field_type == FieldType::Timestamp
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(t) => Ok(t),
            other => unexpected("timestamp", &other),
        }
    }
}

impl FromValue for BTreeMap<String, String> {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality == Cardinality::Required && *field_type == FieldType::Map
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(entries) => entries
                .into_iter()
                .map(|(key, v)| match v {
                    serde_json::Value::String(s) => Ok((key, s)),
                    _ => Err(format!("map key '{}' is not text", key)),
                })
                .collect(),
            other => unexpected("map", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        !cardinality.is_list() && T::accepts(field_type, Cardinality::Required)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn accepts(field_type: &FieldType, cardinality: Cardinality) -> bool {
        cardinality.is_list() && T::accepts(field_type, Cardinality::Required)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => unexpected("list", &other),
        }
    }
}

/// Typed view of a whole tuple.
pub trait FromTuple: Sized {
    const ARITY: usize;

    /// Check the projection's arity and column types against `Self`.
    fn check(projection: &Projection) -> ExpressionResult<()>;

    fn from_tuple(tuple: &Tuple) -> QueryResult<Self>;
}

fn check_column<T: FromValue>(field: &ProjectedField) -> ExpressionResult<()> {
    if T::accepts(&field.field_type, field.cardinality) {
        return Ok(());
    }
    let declared = match field.cardinality {
        Cardinality::Required => field.field_type.to_string(),
        Cardinality::List => format!("list of {}", field.field_type),
        Cardinality::Nullable | Cardinality::Optional => format!("nullable {}", field.field_type),
    };
    Err(ExpressionError::mismatch(
        &field.path,
        declared,
        std::any::type_name::<T>(),
    ))
}

/// A function of `k` positional arguments, called with one `k`-tuple.
pub trait MapperFunction<Args, R>: Send + Sync + 'static {
    fn call(&self, args: Args) -> R;
}

macro_rules! impl_tuple_arity {
    ($arity:literal; $($idx:tt $T:ident),+) => {
        impl<$($T: FromValue),+> FromTuple for ($($T,)+) {
            const ARITY: usize = $arity;

            fn check(projection: &Projection) -> ExpressionResult<()> {
                if projection.arity() != Self::ARITY {
                    return Err(ExpressionError::ArityMismatch {
                        expected: Self::ARITY,
                        actual: projection.arity(),
                    });
                }
                $(check_column::<$T>(&projection.fields[$idx])?;)+
                Ok(())
            }

            fn from_tuple(tuple: &Tuple) -> QueryResult<Self> {
                Ok(($(tuple.get::<$T>($idx)?,)+))
            }
        }

        impl<Func, Ret, $($T),+> MapperFunction<($($T,)+), Ret> for Func
        where
            Func: Fn($($T),+) -> Ret + Send + Sync + 'static,
        {
            fn call(&self, args: ($($T,)+)) -> Ret {
                self($(args.$idx),+)
            }
        }
    };
}

impl_tuple_arity!(1; 0 T0);
impl_tuple_arity!(2; 0 T0, 1 T1);
impl_tuple_arity!(3; 0 T0, 1 T1, 2 T2);
impl_tuple_arity!(4; 0 T0, 1 T1, 2 T2, 3 T3);
impl_tuple_arity!(5; 0 T0, 1 T1, 2 T2, 3 T3, 4 T4);
impl_tuple_arity!(6; 0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5);
impl_tuple_arity!(7; 0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6);
impl_tuple_arity!(8; 0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7);

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(paths: &[&str]) -> Arc<[Path]> {
        paths.iter().map(|p| Path::parse(p)).collect::<Vec<_>>().into()
    }

    fn projection(fields: &[(&str, FieldType, Cardinality)]) -> Projection {
        Projection::new(
            fields
                .iter()
                .map(|(path, field_type, cardinality)| ProjectedField {
                    path: Path::parse(path),
                    field_type: field_type.clone(),
                    cardinality: *cardinality,
                })
                .collect(),
        )
    }

    #[test]
    fn test_typed_access() {
        let tuple = Tuple::new(
            0,
            columns(&["name", "age", "nickname"]),
            vec!["Bob".into(), Value::Integer(21), Value::Null],
        );
        assert_eq!(tuple.get::<String>(0).unwrap(), "Bob");
        assert_eq!(tuple.get::<i64>(1).unwrap(), 21);
        assert_eq!(tuple.get::<f64>(1).unwrap(), 21.0);
        assert_eq!(tuple.get::<Option<String>>(2).unwrap(), None);

        let err = tuple.get::<i64>(0).unwrap_err();
        assert_eq!(
            err,
            QueryError::ProjectionExtraction {
                row: 0,
                path: "name".into(),
                reason: "expected integer, got text".into(),
            }
        );
        assert!(tuple.get::<String>(5).is_err());
    }

    #[test]
    fn test_from_tuple() {
        let tuple = Tuple::new(
            4,
            columns(&["name", "tags"]),
            vec!["Cara".into(), Value::List(vec!["a".into(), "b".into()])],
        );
        let (name, tags) = <(String, Vec<String>)>::from_tuple(&tuple).unwrap();
        assert_eq!(name, "Cara");
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_map_column() {
        let labels = Value::from_json(
            &serde_json::json!({ "team": "core", "tier": "1" }),
            &FieldType::Map,
            Cardinality::Optional,
        )
        .unwrap();
        let tuple = Tuple::new(0, columns(&["labels"]), vec![labels]);
        let read = tuple.get::<Option<BTreeMap<String, String>>>(0).unwrap().unwrap();
        assert_eq!(read.get("team").map(String::as_str), Some("core"));

        let p = projection(&[("labels", FieldType::Map, Cardinality::Optional)]);
        assert!(<(Option<BTreeMap<String, String>>,)>::check(&p).is_ok());
        assert!(<(String,)>::check(&p).is_err());

        assert!(Value::from_json(
            &serde_json::json!({ "tier": 1 }),
            &FieldType::Map,
            Cardinality::Required
        )
        .is_err());
    }

    #[test]
    fn test_check_arity_and_types() {
        let p = projection(&[
            ("name", FieldType::Text, Cardinality::Required),
            ("age", FieldType::Integer, Cardinality::Required),
        ]);
        assert!(<(String, i64)>::check(&p).is_ok());
        assert!(<(String, f64)>::check(&p).is_ok());
        assert_eq!(
            <(String,)>::check(&p).unwrap_err(),
            ExpressionError::ArityMismatch { expected: 1, actual: 2 }
        );
        assert!(matches!(
            <(String, String)>::check(&p),
            Err(ExpressionError::TypeMismatch { .. })
        ));

        let nullable = projection(&[("nickname", FieldType::Text, Cardinality::Nullable)]);
        assert!(<(String,)>::check(&nullable).is_err());
        assert!(<(Option<String>,)>::check(&nullable).is_ok());
        assert!(<(Value,)>::check(&nullable).is_ok());
    }

    #[test]
    fn test_mapper_function_positional_call() {
        fn describe(name: String, age: i64) -> String {
            format!("{} ({})", name, age)
        }
        assert_eq!(describe.call(("Bob".to_string(), 21)), "Bob (21)");

        let first = |a: i64, _b: i64, _c: i64| a;
        assert_eq!(first.call((1, 2, 3)), 1);
    }
}
