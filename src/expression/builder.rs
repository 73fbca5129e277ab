//! Type-checked expression construction against an entity schema.
//!
//! ```ignore
//! let c = Criteria::new(&schema);
//! let adults = c.field("age")?.gte(18)?;
//! let has_cat = c.field("pets")?.any(|pet| pet.field("kind")?.eq("cat"))?;
//! let filter = Expression::and([adults, has_cat]);
//! ```

use super::ast::{ComparisonOp, Expression, Path, Quantifier};
use super::error::{ExpressionError, ExpressionResult};
use super::query::{ProjectedField, Projection, Query, Sort, SortDirection};
use super::value::Value;
use crate::catalog::{resolve_path, Cardinality, EntitySchema, FieldDef, FieldType};

/// Fields visible from a [`Criteria`].
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// Entity root or the element of a list of objects.
    Fields(&'a [FieldDef]),
    /// Element of a list of scalars.
    Element(&'a FieldType),
}

/// Entry point for building expressions whose paths and literals are
/// checked against a schema.
#[derive(Debug, Clone)]
pub struct Criteria<'a> {
    entity: &'a str,
    scope: Scope<'a>,
    /// Absolute path of the current scope, used in error messages.
    origin: Path,
}

impl<'a> Criteria<'a> {
    pub fn new(schema: &'a EntitySchema) -> Self {
        Self {
            entity: &schema.name,
            scope: Scope::Fields(&schema.fields),
            origin: Path::element(),
        }
    }

    /// Name of the queried entity.
    pub fn entity(&self) -> &str {
        self.entity
    }

    /// Empty query against this entity.
    pub fn query(&self) -> Query {
        Query::new(self.entity)
    }

    /// Resolve a dotted path relative to the current scope.
    pub fn field(&self, path: &str) -> ExpressionResult<FieldRef<'a>> {
        let parsed = Path::parse(path);
        let display = self.origin.join(&parsed);
        let fields = match self.scope {
            Scope::Fields(fields) => fields,
            Scope::Element(_) => return Err(ExpressionError::UnknownField(display.dotted())),
        };
        let def = resolve_path(fields, parsed.segments())
            .ok_or_else(|| ExpressionError::UnknownField(display.dotted()))?;
        Ok(FieldRef {
            entity: self.entity,
            path: parsed,
            display,
            field_type: &def.field_type,
            cardinality: def.cardinality,
        })
    }

    /// The current element inside a predicate over a list of scalars.
    pub fn element(&self) -> ExpressionResult<FieldRef<'a>> {
        match self.scope {
            Scope::Element(field_type) => Ok(FieldRef {
                entity: self.entity,
                path: Path::element(),
                display: self.origin.clone(),
                field_type,
                cardinality: Cardinality::Required,
            }),
            Scope::Fields(_) => Err(ExpressionError::mismatch(
                &self.origin,
                "list of scalars",
                "object scope",
            )),
        }
    }

    /// Sort key on a single-valued, orderable field.
    pub fn sort(&self, path: &str, direction: SortDirection) -> ExpressionResult<Sort> {
        let field = self.field(path)?;
        field.require_scalar()?;
        if matches!(field.field_type, FieldType::Object(_) | FieldType::Map) {
            return Err(ExpressionError::mismatch(
                &field.display,
                "sortable field",
                field.field_type.kind_name(),
            ));
        }
        Ok(Sort { path: field.path, direction })
    }

    /// Projection over `paths`, in order. Types come from the schema.
    pub fn projection<I, S>(&self, paths: I) -> ExpressionResult<Projection>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = paths
            .into_iter()
            .map(|p| {
                let field = self.field(p.as_ref())?;
                Ok(ProjectedField {
                    path: field.path,
                    field_type: field.field_type.clone(),
                    cardinality: field.cardinality,
                })
            })
            .collect::<ExpressionResult<Vec<_>>>()?;
        if fields.is_empty() {
            return Err(ExpressionError::EmptyProjection);
        }
        Ok(Projection::new(fields))
    }
}

/// A resolved field reference. Every predicate method type-checks its
/// operands and fails with [`ExpressionError::TypeMismatch`].
#[derive(Debug, Clone)]
pub struct FieldRef<'a> {
    entity: &'a str,
    path: Path,
    display: Path,
    field_type: &'a FieldType,
    cardinality: Cardinality,
}

impl<'a> FieldRef<'a> {
    /// Path relative to the enclosing scope.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn field_type(&self) -> &'a FieldType {
        self.field_type
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn eq(&self, value: impl Into<Value>) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Eq, value.into())
    }

    pub fn ne(&self, value: impl Into<Value>) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Ne, value.into())
    }

    pub fn gt(&self, value: impl Into<Value>) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Gt, value.into())
    }

    pub fn gte(&self, value: impl Into<Value>) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Gte, value.into())
    }

    pub fn lt(&self, value: impl Into<Value>) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Lt, value.into())
    }

    pub fn lte(&self, value: impl Into<Value>) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Lte, value.into())
    }

    /// `path op value`. `Null` is accepted only with `eq`/`ne` on fields
    /// that may be absent.
    pub fn compare(&self, op: ComparisonOp, value: Value) -> ExpressionResult<Expression> {
        self.require_scalar()?;
        let value = check_comparison(&self.display, self.field_type, self.cardinality, op, value)?;
        Ok(self.comparison(op, value))
    }

    pub fn is_in<I, V>(&self, values: I) -> ExpressionResult<Expression>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership(values, false)
    }

    pub fn not_in<I, V>(&self, values: I) -> ExpressionResult<Expression>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership(values, true)
    }

    /// Field is absent or null.
    pub fn is_absent(&self) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Eq, Value::Null)
    }

    /// Field is present and not null.
    pub fn is_present(&self) -> ExpressionResult<Expression> {
        self.compare(ComparisonOp::Ne, Value::Null)
    }

    /// Boolean field is `true`.
    pub fn is_true(&self) -> ExpressionResult<Expression> {
        self.require_scalar()?;
        match self.field_type {
            FieldType::Boolean => Ok(Expression::Path(self.path.clone())),
            other => Err(ExpressionError::mismatch(&self.display, "boolean", other)),
        }
    }

    /// At least one element satisfies `predicate`.
    pub fn any<F>(&self, predicate: F) -> ExpressionResult<Expression>
    where
        F: FnOnce(&Criteria<'a>) -> ExpressionResult<Expression>,
    {
        let inner = predicate(&self.element_scope()?)?;
        Ok(self.collection(Quantifier::Any(Box::new(inner))))
    }

    /// Every element satisfies `predicate`.
    pub fn all<F>(&self, predicate: F) -> ExpressionResult<Expression>
    where
        F: FnOnce(&Criteria<'a>) -> ExpressionResult<Expression>,
    {
        let inner = predicate(&self.element_scope()?)?;
        Ok(self.collection(Quantifier::All(Box::new(inner))))
    }

    /// Number of elements compares to `size`.
    pub fn size(&self, op: ComparisonOp, size: usize) -> ExpressionResult<Expression> {
        self.require_list()?;
        Ok(self.collection(Quantifier::Size { op, size }))
    }

    pub fn is_empty(&self) -> ExpressionResult<Expression> {
        self.size(ComparisonOp::Eq, 0)
    }

    pub fn not_empty(&self) -> ExpressionResult<Expression> {
        self.size(ComparisonOp::Gt, 0)
    }

    fn membership<I, V>(&self, values: I, negated: bool) -> ExpressionResult<Expression>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.require_scalar()?;
        let values = values.into_iter().map(Into::into);
        let values = check_membership(&self.display, self.field_type, values)?;
        Ok(Expression::Membership {
            path: self.path.clone(),
            values,
            negated,
        })
    }

    fn comparison(&self, op: ComparisonOp, value: Value) -> Expression {
        Expression::Comparison {
            op,
            path: self.path.clone(),
            value,
        }
    }

    fn collection(&self, quantifier: Quantifier) -> Expression {
        Expression::Collection {
            path: self.path.clone(),
            quantifier,
        }
    }

    fn element_scope(&self) -> ExpressionResult<Criteria<'a>> {
        self.require_list()?;
        let scope = match self.field_type {
            FieldType::Object(fields) => Scope::Fields(fields),
            other => Scope::Element(other),
        };
        Ok(Criteria {
            entity: self.entity,
            scope,
            origin: self.display.clone(),
        })
    }

    fn require_scalar(&self) -> ExpressionResult<()> {
        if self.cardinality.is_list() {
            return Err(ExpressionError::mismatch(
                &self.display,
                "single value",
                format!("list of {}", self.field_type),
            ));
        }
        Ok(())
    }

    fn require_list(&self) -> ExpressionResult<()> {
        if !self.cardinality.is_list() {
            return Err(ExpressionError::mismatch(&self.display, "list", self.field_type));
        }
        Ok(())
    }
}

/// Check the operand of `display op value` against the field's type and
/// cardinality. Returns the literal as it should be compiled.
pub(crate) fn check_comparison(
    display: &Path,
    field_type: &FieldType,
    cardinality: Cardinality,
    op: ComparisonOp,
    value: Value,
) -> ExpressionResult<Value> {
    if value.is_null() {
        if op.is_range() {
            return Err(ExpressionError::mismatch(display, field_type, "null"));
        }
        if !cardinality.allows_absence() {
            return Err(ExpressionError::mismatch(
                display,
                format!("non-null {}", field_type),
                "null",
            ));
        }
        return Ok(Value::Null);
    }
    if op.is_range() && !field_type.is_ordered() {
        return Err(ExpressionError::mismatch(display, "ordered type", field_type));
    }
    check_literal(display, field_type, value)
}

/// Check every value of an `IN` list against the field type.
pub(crate) fn check_membership<I>(
    display: &Path,
    field_type: &FieldType,
    values: I,
) -> ExpressionResult<Vec<Value>>
where
    I: IntoIterator<Item = Value>,
{
    values
        .into_iter()
        .map(|v| {
            if v.is_null() {
                return Err(ExpressionError::InvalidLiteral(format!(
                    "null in IN list for {}",
                    display
                )));
            }
            check_literal(display, field_type, v)
        })
        .collect()
}

/// Check a non-null literal against the field type, widening integers
/// for float fields.
fn check_literal(display: &Path, field_type: &FieldType, value: Value) -> ExpressionResult<Value> {
    match (field_type, value) {
        (FieldType::Boolean, v @ Value::Boolean(_)) => Ok(v),
        (FieldType::Integer, v @ Value::Integer(_)) => Ok(v),
        (FieldType::Float, Value::Integer(n)) => Ok(Value::Float(n as f64)),
        (FieldType::Float, v @ Value::Float(_)) => Ok(v),
        (FieldType::Text, v @ Value::Text(_)) => Ok(v),
        (FieldType::Date, v @ Value::Date(_)) => Ok(v),
        (FieldType::Timestamp, v @ Value::Timestamp(_)) => Ok(v),
        (FieldType::Enum(variants), Value::Text(s)) => {
            if variants.contains(&s) {
                Ok(Value::Text(s))
            } else {
                Err(ExpressionError::mismatch(display, field_type, format!("'{}'", s)))
            }
        }
        (field_type, v) => Err(ExpressionError::mismatch(display, field_type, v.kind_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaBuilder;
    use crate::expression::LogicalOp;
    use chrono::NaiveDate;

    fn people() -> EntitySchema {
        SchemaBuilder::new("people")
            .add_field("name", FieldType::Text)
            .add_field("age", FieldType::Integer)
            .add_field("score", FieldType::Float)
            .add_field("active", FieldType::Boolean)
            .add_nullable_field("nickname", FieldType::Text)
            .add_field("born", FieldType::Date)
            .add_field("color", FieldType::Enum(vec!["RED".into(), "BLUE".into()]))
            .add_field(
                "address",
                FieldType::Object(vec![FieldDef::new("city", FieldType::Text)]),
            )
            .add_list_field("tags", FieldType::Text)
            .add_list_field(
                "pets",
                FieldType::Object(vec![
                    FieldDef::new("kind", FieldType::Text),
                    FieldDef::new("age", FieldType::Integer),
                ]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_comparison_builds_structural_node() {
        let schema = people();
        let c = Criteria::new(&schema);
        let expr = c.field("age").unwrap().gte(18).unwrap();
        assert_eq!(
            expr,
            Expression::Comparison {
                op: ComparisonOp::Gte,
                path: Path::parse("age"),
                value: Value::Integer(18),
            }
        );
    }

    #[test]
    fn test_cross_kind_comparison_rejected() {
        let schema = people();
        let c = Criteria::new(&schema);
        let err = c.field("age").unwrap().eq("eighteen").unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::TypeMismatch { ref path, ref expected, ref actual }
                if path == "age" && expected == "integer" && actual == "text"
        ));
        assert!(c.field("name").unwrap().gt(3).is_err());
        assert!(c.field("born").unwrap().eq("2020-01-01").is_err());
    }

    #[test]
    fn test_integer_widens_to_float() {
        let schema = people();
        let c = Criteria::new(&schema);
        let expr = c.field("score").unwrap().lt(3).unwrap();
        assert!(matches!(
            expr,
            Expression::Comparison { value: Value::Float(f), .. } if f == 3.0
        ));
        assert!(c.field("age").unwrap().lt(3.5).is_err());
    }

    #[test]
    fn test_null_only_for_nullable_equality() {
        let schema = people();
        let c = Criteria::new(&schema);
        assert!(c.field("nickname").unwrap().is_absent().is_ok());
        assert!(c.field("nickname").unwrap().is_present().is_ok());
        assert!(c.field("name").unwrap().is_absent().is_err());
        assert!(c.field("nickname").unwrap().gt(Value::Null).is_err());
        assert!(c.field("nickname").unwrap().eq(None::<String>).is_ok());
    }

    #[test]
    fn test_boolean_not_ordered() {
        let schema = people();
        let c = Criteria::new(&schema);
        assert!(c.field("active").unwrap().gt(true).is_err());
        assert_eq!(
            c.field("active").unwrap().is_true().unwrap(),
            Expression::Path(Path::parse("active"))
        );
        assert!(c.field("age").unwrap().is_true().is_err());
    }

    #[test]
    fn test_enum_variants_checked() {
        let schema = people();
        let c = Criteria::new(&schema);
        assert!(c.field("color").unwrap().eq("RED").is_ok());
        assert!(c.field("color").unwrap().eq("PINK").is_err());
        assert!(c.field("color").unwrap().is_in(["RED", "PINK"]).is_err());
    }

    #[test]
    fn test_unknown_and_nested_paths() {
        let schema = people();
        let c = Criteria::new(&schema);
        assert_eq!(
            c.field("salary").unwrap_err(),
            ExpressionError::UnknownField("salary".into())
        );
        assert!(c.field("address.city").unwrap().eq("Paris").is_ok());
        assert!(c.field("address.zip").is_err());
    }

    #[test]
    fn test_membership() {
        let schema = people();
        let c = Criteria::new(&schema);
        let expr = c.field("name").unwrap().not_in(["a", "b"]).unwrap();
        assert!(matches!(expr, Expression::Membership { negated: true, ref values, .. } if values.len() == 2));
        assert!(c.field("name").unwrap().is_in([Value::Null]).is_err());
    }

    #[test]
    fn test_collection_predicates_require_lists() {
        let schema = people();
        let c = Criteria::new(&schema);
        assert!(c.field("tags").unwrap().eq("x").is_err());
        assert!(c.field("name").unwrap().is_empty().is_err());

        let any = c
            .field("tags")
            .unwrap()
            .any(|t| t.element()?.eq("urgent"))
            .unwrap();
        assert_eq!(
            any,
            Expression::Collection {
                path: Path::parse("tags"),
                quantifier: Quantifier::Any(Box::new(Expression::Comparison {
                    op: ComparisonOp::Eq,
                    path: Path::element(),
                    value: "urgent".into(),
                })),
            }
        );
    }

    #[test]
    fn test_nested_element_scope() {
        let schema = people();
        let c = Criteria::new(&schema);
        let all = c
            .field("pets")
            .unwrap()
            .all(|pet| pet.field("age")?.lt(10))
            .unwrap();
        assert!(matches!(all, Expression::Collection { quantifier: Quantifier::All(_), .. }));

        let err = c
            .field("pets")
            .unwrap()
            .any(|pet| pet.field("name")?.eq("Rex"))
            .unwrap_err();
        assert_eq!(err, ExpressionError::UnknownField("pets.name".into()));

        assert!(c.field("pets").unwrap().any(|pet| pet.element()?.eq("x")).is_err());
        assert!(c.field("tags").unwrap().any(|t| t.field("x")?.eq("y")).is_err());
    }

    #[test]
    fn test_sort_and_projection() {
        let schema = people();
        let c = Criteria::new(&schema);
        assert!(c.sort("age", SortDirection::Descending).is_ok());
        assert!(c.sort("tags", SortDirection::Ascending).is_err());
        assert!(c.sort("address", SortDirection::Ascending).is_err());

        let projection = c.projection(["name", "age"]).unwrap();
        assert_eq!(projection.arity(), 2);
        assert_eq!(projection.fields[1].field_type, FieldType::Integer);
        assert_eq!(
            c.projection(Vec::<&str>::new()).unwrap_err(),
            ExpressionError::EmptyProjection
        );
    }

    #[test]
    fn test_map_fields_test_presence_only() {
        let schema = SchemaBuilder::new("services")
            .add_optional_field("labels", FieldType::Map)
            .build()
            .unwrap();
        let c = Criteria::new(&schema);
        let labels = c.field("labels").unwrap();
        assert!(labels.is_present().is_ok());
        assert!(labels.eq("core").is_err());
        assert!(c.sort("labels", SortDirection::Ascending).is_err());
        assert!(c.projection(["labels"]).is_ok());
    }

    #[test]
    fn test_combinators_over_checked_leaves() {
        let schema = people();
        let c = Criteria::new(&schema);
        let born = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let expr = Expression::not(Expression::and([
            c.field("born").unwrap().lt(born).unwrap(),
            c.field("active").unwrap().is_true().unwrap(),
        ]));
        assert!(matches!(expr, Expression::Logical { op: LogicalOp::Not, .. }));
        assert_eq!(expr.node_count(), 4);
    }
}
