//! Memoized compilation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::error::CompileResult;
use super::{CompiledQuery, QueryCompiler};
use crate::catalog::EntitySchema;
use crate::expression::Query;

/// Caches compiled queries per structurally equal [`Query`].
///
/// One cache serves one schema: entries are keyed by query only.
pub struct CompiledQueryCache<C: QueryCompiler> {
    compiler: C,
    entries: RwLock<HashMap<Query, Arc<CompiledQuery<C::Native>>>>,
}

impl<C: QueryCompiler> CompiledQueryCache<C> {
    pub fn new(compiler: C) -> Self {
        Self {
            compiler,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Return the cached compilation of `query`, compiling on a miss.
    /// Failed compilations are not cached.
    pub fn get_or_compile(
        &self,
        query: &Query,
        schema: &EntitySchema,
    ) -> CompileResult<Arc<CompiledQuery<C::Native>>> {
        if let Some(hit) = self.entries.read().get(query) {
            debug!(backend = self.compiler.backend(), "compiled query cache hit");
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(super::compile(&self.compiler, query, schema)?);
        debug!(backend = self.compiler.backend(), "compiled query cache miss");
        let mut entries = self.entries.write();
        let entry = entries.entry(query.clone()).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
