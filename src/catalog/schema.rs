//! Entity schema definitions and path resolution.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{Cardinality, FieldDef, FieldType};

/// Field metadata for one queried entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity (collection / index / table) name.
    pub name: String,
    /// Top-level field definitions.
    pub fields: Vec<FieldDef>,
    /// Entity description/comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntitySchema {
    /// Create a new entity schema.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
            description: None,
        }
    }

    /// Load and validate a schema from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a schema from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let schema: EntitySchema = serde_json::from_str(text)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Get a top-level field definition by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get top-level field names.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Resolve a dotted path (already split into segments) to its field.
    pub fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Option<&FieldDef> {
        resolve_path(&self.fields, segments)
    }

    /// Validate the schema itself (duplicates, empty enums), recursively.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_fields(&self.fields, "")
    }
}

/// Resolve a path against a list of fields.
///
/// Intermediate segments must be single-valued objects; lists are only
/// entered through collection predicates, whose element paths resolve
/// against the element's own fields.
pub fn resolve_path<'a, S: AsRef<str>>(fields: &'a [FieldDef], segments: &[S]) -> Option<&'a FieldDef> {
    let (first, rest) = segments.split_first()?;
    let field = fields.iter().find(|f| f.name == first.as_ref())?;
    if rest.is_empty() {
        return Some(field);
    }
    if field.cardinality == Cardinality::List {
        return None;
    }
    match &field.field_type {
        FieldType::Object(children) => resolve_path(children, rest),
        _ => None,
    }
}

fn validate_fields(fields: &[FieldDef], prefix: &str) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for field in fields {
        let qualified = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };
        if field.name.is_empty() || field.name.contains('.') {
            return Err(SchemaError::InvalidFieldName(qualified));
        }
        if !seen.insert(&field.name) {
            return Err(SchemaError::DuplicateField(qualified));
        }
        match &field.field_type {
            FieldType::Enum(variants) if variants.is_empty() => {
                return Err(SchemaError::EmptyEnum(qualified));
            }
            FieldType::Object(children) => validate_fields(children, &qualified)?,
            _ => {}
        }
    }
    Ok(())
}

/// Schema-related errors.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate field: {0}")]
    DuplicateField(String),

    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),

    #[error("enum field has no variants: {0}")]
    EmptyEnum(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Builder for creating entity schemas.
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
    description: Option<String>,
}

impl SchemaBuilder {
    /// Start building a new schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            description: None,
        }
    }

    /// Add a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a required field with just name and type.
    pub fn add_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, field_type));
        self
    }

    /// Add a nullable field.
    pub fn add_nullable_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(
            FieldDef::new(name, field_type).with_cardinality(Cardinality::Nullable),
        );
        self
    }

    /// Add an optional field.
    pub fn add_optional_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(
            FieldDef::new(name, field_type).with_cardinality(Cardinality::Optional),
        );
        self
    }

    /// Add a list field.
    pub fn add_list_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, field_type).with_cardinality(Cardinality::List));
        self
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Build the schema.
    pub fn build(self) -> Result<EntitySchema, SchemaError> {
        let mut schema = EntitySchema::new(self.name, self.fields);
        schema.description = self.description;
        schema.validate()?;
        Ok(schema)
    }
}
