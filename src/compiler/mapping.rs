//! Elasticsearch field mappings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{EntitySchema, FieldDef, FieldType};

/// How one field is indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldMapping {
    Keyword,
    /// Analyzed text, optionally with an exact-match sub-field.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyword: Option<String>,
    },
    Long,
    Double,
    Boolean,
    Date,
    Object,
    /// List of objects indexed as separate hidden documents.
    Nested,
    /// Whole object indexed as keyword leaves under arbitrary keys.
    Flattened,
}

impl FieldMapping {
    /// Default mapping for a schema field.
    pub fn for_field(field_type: &FieldType, is_list: bool) -> Self {
        match field_type {
            FieldType::Boolean => FieldMapping::Boolean,
            FieldType::Integer => FieldMapping::Long,
            FieldType::Float => FieldMapping::Double,
            FieldType::Text | FieldType::Enum(_) => FieldMapping::Keyword,
            FieldType::Date | FieldType::Timestamp => FieldMapping::Date,
            FieldType::Object(_) if is_list => FieldMapping::Nested,
            FieldType::Object(_) => FieldMapping::Object,
            FieldType::Map => FieldMapping::Flattened,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldMapping::Keyword => "keyword",
            FieldMapping::Text { .. } => "text",
            FieldMapping::Long => "long",
            FieldMapping::Double => "double",
            FieldMapping::Boolean => "boolean",
            FieldMapping::Date => "date",
            FieldMapping::Object => "object",
            FieldMapping::Nested => "nested",
            FieldMapping::Flattened => "flattened",
        }
    }
}

/// Field mappings of one index, keyed by dotted path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mappings {
    fields: BTreeMap<String, FieldMapping>,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mappings implied by the schema. Text fields map to `keyword`.
    pub fn from_schema(schema: &EntitySchema) -> Self {
        let mut mappings = Self::new();
        mappings.add_fields("", &schema.fields);
        mappings
    }

    fn add_fields(&mut self, prefix: &str, fields: &[FieldDef]) {
        for field in fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };
            let mapping = FieldMapping::for_field(&field.field_type, field.is_list());
            self.fields.insert(path.clone(), mapping);
            if let Some(children) = field.field_type.fields() {
                self.add_fields(&path, children);
            }
        }
    }

    /// Override the mapping of one path.
    pub fn with_field(mut self, path: impl Into<String>, mapping: FieldMapping) -> Self {
        self.fields.insert(path.into(), mapping);
        self
    }

    pub fn get(&self, path: &str) -> Option<&FieldMapping> {
        self.fields.get(path)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index mapping document (`{"properties": {...}}`).
    pub fn to_properties(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (path, mapping) in &self.fields {
            let segments: Vec<&str> = path.split('.').collect();
            insert_property(&mut root, &segments, mapping);
        }
        serde_json::json!({ "properties": root })
    }
}

fn insert_property(
    properties: &mut serde_json::Map<String, serde_json::Value>,
    segments: &[&str],
    mapping: &FieldMapping,
) {
    match segments {
        [] => {}
        [name] => {
            let entry = properties
                .entry(name.to_string())
                .or_insert_with(|| serde_json::json!({}));
            if let Some(object) = entry.as_object_mut() {
                object.insert("type".into(), mapping.type_name().into());
                if let FieldMapping::Text { keyword: Some(sub) } = mapping {
                    object.insert(
                        "fields".into(),
                        serde_json::json!({ sub.as_str(): { "type": "keyword" } }),
                    );
                }
            }
        }
        [parent, rest @ ..] => {
            let entry = properties
                .entry(parent.to_string())
                .or_insert_with(|| serde_json::json!({}));
            let children = entry.as_object_mut().and_then(|object| {
                object
                    .entry("properties")
                    .or_insert_with(|| serde_json::json!({}))
                    .as_object_mut()
            });
            if let Some(children) = children {
                insert_property(children, rest, mapping);
            }
        }
    }
}
