//! Path resolution shared by the compilers.

use super::error::{CompileError, CompileResult};
use crate::catalog::{resolve_path, Cardinality, EntitySchema, FieldDef, FieldType};
use crate::expression::{
    check_comparison, check_membership, ComparisonOp, ExpressionError, Path, Projection, Value,
};

#[derive(Debug, Clone, Copy)]
enum Fields<'a> {
    Object(&'a [FieldDef]),
    Element(&'a FieldType),
}

/// Fields visible at one level of a predicate: the entity root, or the
/// element of a list inside `any`/`all`.
#[derive(Debug, Clone)]
pub(crate) struct Scope<'a> {
    fields: Fields<'a>,
    prefix: Path,
}

/// A path resolved against a [`Scope`].
#[derive(Debug, Clone)]
pub(crate) struct Resolved<'a> {
    /// Path from the entity root.
    pub absolute: Path,
    pub field_type: &'a FieldType,
    pub cardinality: Cardinality,
}

impl Resolved<'_> {
    pub fn dotted(&self) -> String {
        self.absolute.dotted()
    }

    /// Type-check the operand of a comparison on this field. Queries that
    /// did not go through the typed builder are checked here.
    pub fn check_comparison(&self, op: ComparisonOp, value: &Value) -> CompileResult<Value> {
        let value = value.clone();
        Ok(check_comparison(&self.absolute, self.field_type, self.cardinality, op, value)?)
    }

    pub fn check_membership(&self, values: &[Value]) -> CompileResult<Vec<Value>> {
        let values = values.iter().cloned();
        Ok(check_membership(&self.absolute, self.field_type, values)?)
    }
}

/// `text`, `text NULL`, `text?` or `text[]`.
fn declared(field_type: &FieldType, cardinality: Cardinality) -> String {
    match cardinality {
        Cardinality::Required => field_type.to_string(),
        Cardinality::Nullable => format!("{} NULL", field_type),
        Cardinality::Optional => format!("{}?", field_type),
        Cardinality::List => format!("{}[]", field_type),
    }
}

impl<'a> Scope<'a> {
    pub fn root(schema: &'a EntitySchema) -> Self {
        Self {
            fields: Fields::Object(&schema.fields),
            prefix: Path::element(),
        }
    }

    pub fn resolve(&self, path: &Path, backend: &str) -> CompileResult<Resolved<'a>> {
        let absolute = self.prefix.join(path);
        match (self.fields, path.is_element()) {
            (Fields::Element(field_type), true) => Ok(Resolved {
                absolute,
                field_type,
                cardinality: Cardinality::Required,
            }),
            (Fields::Object(fields), false) => resolve_path(fields, path.segments())
                .map(|def| Resolved {
                    absolute: absolute.clone(),
                    field_type: &def.field_type,
                    cardinality: def.cardinality,
                })
                .ok_or_else(|| {
                    CompileError::field_mapping(&absolute, backend, "not declared in schema")
                }),
            (Fields::Element(_), false) => Err(CompileError::field_mapping(
                &absolute,
                backend,
                "list elements are scalars",
            )),
            (Fields::Object(_), true) => Err(CompileError::field_mapping(
                &self.prefix,
                backend,
                "element reference outside a scalar list",
            )),
        }
    }

    /// Like [`Scope::resolve`], but rejects list fields.
    pub fn resolve_scalar(&self, path: &Path, backend: &str) -> CompileResult<Resolved<'a>> {
        let resolved = self.resolve(path, backend)?;
        if resolved.cardinality.is_list() {
            return Err(CompileError::operator(
                format!("scalar predicate on list field {}", resolved.absolute),
                backend,
            ));
        }
        Ok(resolved)
    }

    /// Like [`Scope::resolve`], but requires a list field.
    pub fn resolve_list(&self, path: &Path, backend: &str, operator: &str) -> CompileResult<Resolved<'a>> {
        let resolved = self.resolve(path, backend)?;
        if !resolved.cardinality.is_list() {
            return Err(CompileError::operator(
                format!("{} on non-list field {}", operator, resolved.absolute),
                backend,
            ));
        }
        Ok(resolved)
    }

    /// Check that every projected column is declared with the type and
    /// cardinality it will be extracted as.
    pub fn check_projection(&self, projection: &Projection, backend: &str) -> CompileResult<()> {
        for field in &projection.fields {
            let resolved = self.resolve(&field.path, backend)?;
            if &field.field_type != resolved.field_type || field.cardinality != resolved.cardinality {
                return Err(ExpressionError::mismatch(
                    &resolved.absolute,
                    declared(resolved.field_type, resolved.cardinality),
                    declared(&field.field_type, field.cardinality),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Scope of the elements of a resolved list field.
    pub fn enter(&self, list: &Resolved<'a>) -> Scope<'a> {
        let fields = match list.field_type {
            FieldType::Object(fields) => Fields::Object(fields),
            other => Fields::Element(other),
        };
        Scope {
            fields,
            prefix: list.absolute.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaBuilder;

    #[test]
    fn test_resolve_through_list_scope() {
        let schema = SchemaBuilder::new("people")
            .add_field("name", FieldType::Text)
            .add_list_field("tags", FieldType::Text)
            .add_list_field(
                "pets",
                FieldType::Object(vec![FieldDef::new("kind", FieldType::Text)]),
            )
            .build()
            .unwrap();
        let root = Scope::root(&schema);

        assert!(root.resolve_scalar(&Path::parse("name"), "test").is_ok());
        assert!(root.resolve_scalar(&Path::parse("tags"), "test").is_err());
        assert!(root.resolve(&Path::parse("pets.kind"), "test").is_err());

        let pets = root.resolve_list(&Path::parse("pets"), "test", "any").unwrap();
        let kind = root.enter(&pets).resolve(&Path::parse("kind"), "test").unwrap();
        assert_eq!(kind.dotted(), "pets.kind");

        let tags = root.resolve_list(&Path::parse("tags"), "test", "any").unwrap();
        let element = root.enter(&tags).resolve(&Path::element(), "test").unwrap();
        assert_eq!(element.dotted(), "tags");
        assert_eq!(element.field_type, &FieldType::Text);
    }

    #[test]
    fn test_resolved_checks_literals() {
        let schema = SchemaBuilder::new("people")
            .add_field("age", FieldType::Integer)
            .add_field("score", FieldType::Float)
            .add_nullable_field("nickname", FieldType::Text)
            .build()
            .unwrap();
        let root = Scope::root(&schema);

        let age = root.resolve(&Path::parse("age"), "test").unwrap();
        let err = age
            .check_comparison(ComparisonOp::Gte, &Value::Text("eighteen".into()))
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::Expression(ExpressionError::mismatch("age", "integer", "text"))
        );
        assert!(age.check_comparison(ComparisonOp::Eq, &Value::Null).is_err());
        assert!(age.check_membership(&[Value::Integer(1), Value::Boolean(true)]).is_err());

        let score = root.resolve(&Path::parse("score"), "test").unwrap();
        assert_eq!(
            score.check_comparison(ComparisonOp::Lt, &Value::Integer(3)).unwrap(),
            Value::Float(3.0)
        );

        let nickname = root.resolve(&Path::parse("nickname"), "test").unwrap();
        assert_eq!(
            nickname.check_comparison(ComparisonOp::Ne, &Value::Null).unwrap(),
            Value::Null
        );
        assert!(nickname.check_comparison(ComparisonOp::Gt, &Value::Null).is_err());
    }

    #[test]
    fn test_projection_types_match_schema() {
        use crate::expression::ProjectedField;

        let schema = SchemaBuilder::new("people")
            .add_field("age", FieldType::Integer)
            .add_nullable_field("nickname", FieldType::Text)
            .build()
            .unwrap();
        let root = Scope::root(&schema);
        let column = |path: &str, field_type: FieldType, cardinality: Cardinality| ProjectedField {
            path: Path::parse(path),
            field_type,
            cardinality,
        };

        let ok = Projection::new(vec![
            column("age", FieldType::Integer, Cardinality::Required),
            column("nickname", FieldType::Text, Cardinality::Nullable),
        ]);
        assert!(root.check_projection(&ok, "test").is_ok());

        let wrong_type = Projection::new(vec![column("age", FieldType::Text, Cardinality::Required)]);
        assert_eq!(
            root.check_projection(&wrong_type, "test").unwrap_err(),
            CompileError::Expression(ExpressionError::mismatch("age", "integer", "text"))
        );

        let wrong_cardinality =
            Projection::new(vec![column("nickname", FieldType::Text, Cardinality::Required)]);
        assert_eq!(
            root.check_projection(&wrong_cardinality, "test").unwrap_err(),
            CompileError::Expression(ExpressionError::mismatch("nickname", "text NULL", "text"))
        );
    }
}
