//! Backend query compilers.
//!
//! A compiler lowers a [`Query`] into one backend's native query
//! representation. Each compiler is an [`ExpressionVisitor`] over the filter
//! tree and a pure function of the query and the entity schema, so equal
//! inputs always produce equal [`CompiledQuery`] values.
//!
//! [`ExpressionVisitor`]: crate::expression::ExpressionVisitor

mod cache;
mod elasticsearch;
mod error;
mod mapping;
mod memory;
mod scope;
mod sql;

use std::fmt;

use serde::Serialize;
use tracing::debug;

pub use cache::CompiledQueryCache;
pub use elasticsearch::ElasticsearchCompiler;
pub use error::{CompileError, CompileResult};
pub use mapping::{FieldMapping, Mappings};
pub use memory::{MemoryCompiler, MemoryPlan, Predicate, SortKey};
pub use sql::{SqlCompiler, SqlQuery};

use scope::Scope;

use crate::catalog::EntitySchema;
use crate::expression::{Projection, Query};

/// Lowers queries into a backend-native representation.
pub trait QueryCompiler: Send + Sync {
    /// Native query representation.
    type Native: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static;

    /// Backend name used in errors and logs.
    fn backend(&self) -> &'static str;

    /// Translate the query body. Callers go through [`QueryCompiler::compile`].
    fn compile_native(&self, query: &Query, schema: &EntitySchema) -> CompileResult<Self::Native>;

    /// Compile a query against the schema of its entity.
    fn compile(
        &self,
        query: &Query,
        schema: &EntitySchema,
    ) -> CompileResult<CompiledQuery<Self::Native>> {
        if query.entity != schema.name {
            return Err(CompileError::EntityMismatch {
                query: query.entity.clone(),
                schema: schema.name.clone(),
            });
        }
        if let Some(projection) = &query.projection {
            Scope::root(schema).check_projection(projection, self.backend())?;
        }
        let native = self.compile_native(query, schema)?;
        Ok(CompiledQuery {
            backend: self.backend(),
            entity: query.entity.clone(),
            native,
            projection: query.projection.clone(),
        })
    }
}

/// Immutable output of a compiler. Safe to share across executions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery<N> {
    pub backend: &'static str,
    pub entity: String,
    pub native: N,
    /// Columns the execution core extracts from each raw document.
    pub projection: Option<Projection>,
}

impl<N: Serialize> CompiledQuery<N> {
    /// Native query as JSON, for logging and explain output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.native).unwrap_or(serde_json::Value::Null)
    }
}

/// Compile `query` with `compiler`.
pub fn compile<C: QueryCompiler>(
    compiler: &C,
    query: &Query,
    schema: &EntitySchema,
) -> CompileResult<CompiledQuery<C::Native>> {
    let result = compiler.compile(query, schema);
    match &result {
        Ok(_) => debug!(backend = compiler.backend(), entity = %query.entity, "compiled query"),
        Err(e) => debug!(backend = compiler.backend(), error = %e, "query compilation failed"),
    }
    result
}
