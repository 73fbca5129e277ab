//! Catalog module for entity field metadata.
//!
//! Schemas describe the fields of a queried entity: their types, whether
//! they may be absent, and whether they hold lists. Expressions are
//! type-checked and compilers resolve paths against this metadata.

mod schema;
mod types;

pub use schema::{resolve_path, EntitySchema, SchemaBuilder, SchemaError};
pub use types::{Cardinality, FieldDef, FieldType};
