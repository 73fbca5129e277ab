//! Field types and cardinalities for entity metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of an entity field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Boolean values.
    Boolean,
    /// Signed integers (stored as i64).
    Integer,
    /// Floating point numbers.
    Float,
    /// Text/string data.
    Text,
    /// Calendar dates (`YYYY-MM-DD`).
    Date,
    /// Instants (RFC 3339).
    Timestamp,
    /// Closed set of variant names, stored as text.
    Enum(Vec<String>),
    /// Embedded document with its own fields.
    Object(Vec<FieldDef>),
    /// Free-form object of text keys to text values.
    Map,
}

impl FieldType {
    /// Short name used in error messages and explain output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Enum(_) => "enum",
            FieldType::Object(_) => "object",
            FieldType::Map => "map",
        }
    }

    /// Check if values of this type have a total order usable by range operators.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FieldType::Boolean | FieldType::Object(_) | FieldType::Map)
    }

    /// Check if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    /// Nested fields of an object type.
    pub fn fields(&self) -> Option<&[FieldDef]> {
        match self {
            FieldType::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Enum(variants) => write!(f, "enum({})", variants.join("|")),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}

/// How many values a field holds and whether it may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Exactly one value, never null.
    #[default]
    Required,
    /// One value or `null`.
    Nullable,
    /// One value or absent.
    Optional,
    /// Zero or more values.
    List,
}

impl Cardinality {
    /// Check if the field may be null or absent.
    pub fn allows_absence(&self) -> bool {
        matches!(self, Cardinality::Nullable | Cardinality::Optional)
    }

    /// Check if the field is multi-valued.
    pub fn is_list(&self) -> bool {
        matches!(self, Cardinality::List)
    }
}

/// Full field definition including name, type and cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name (one path segment).
    pub name: String,
    /// Element type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Cardinality.
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Optional field description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDef {
    /// Create a required field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            cardinality: Cardinality::Required,
            description: None,
        }
    }

    /// Set the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Check if this field may be null or absent.
    pub fn is_nullable(&self) -> bool {
        self.cardinality.allows_absence()
    }

    /// Check if this field holds a list of values.
    pub fn is_list(&self) -> bool {
        self.cardinality.is_list()
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cardinality {
            Cardinality::Required => write!(f, "{} {}", self.name, self.field_type),
            Cardinality::Nullable => write!(f, "{} {} NULL", self.name, self.field_type),
            Cardinality::Optional => write!(f, "{} {}?", self.name, self.field_type),
            Cardinality::List => write!(f, "{} {}[]", self.name, self.field_type),
        }
    }
}
