//! Repository API.
//!
//! A [`Repository`] binds one entity schema to a compiler and the backend
//! session that runs its output. Queries start from [`Repository::find`]
//! and are refined and consumed through a [`Reader`].
//!
//! # Example
//!
//! ```
//! use criteria::backend::MemoryBackend;
//! use criteria::catalog::{FieldType, SchemaBuilder};
//! use criteria::compiler::MemoryCompiler;
//! use criteria::repository::Repository;
//!
//! let schema = SchemaBuilder::new("people")
//!     .add_field("name", FieldType::Text)
//!     .add_field("age", FieldType::Integer)
//!     .build()
//!     .unwrap();
//! let repo = Repository::new(schema, MemoryCompiler::new(), MemoryBackend::default());
//! let adults = repo.find_where("age >= 18").unwrap();
//! assert!(adults.explain().is_ok());
//! ```

mod config;
mod reader;

pub use config::RepositoryConfig;
pub use reader::Reader;

use std::sync::Arc;

use crate::catalog::EntitySchema;
use crate::compiler::{CompiledQueryCache, QueryCompiler};
use crate::executor::BackendSession;
use crate::expression::{Criteria, Expression, ExpressionResult, FilterParser, Query};

/// Typed queries over one entity.
pub struct Repository<C: QueryCompiler, S> {
    schema: EntitySchema,
    cache: CompiledQueryCache<C>,
    session: Arc<S>,
    config: RepositoryConfig,
}

impl<C, S> Repository<C, S>
where
    C: QueryCompiler,
    S: BackendSession<Native = C::Native> + 'static,
{
    pub fn new(schema: EntitySchema, compiler: C, session: S) -> Self {
        Self {
            schema,
            cache: CompiledQueryCache::new(compiler),
            session: Arc::new(session),
            config: RepositoryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Compiled query cache of this repository.
    pub fn cache(&self) -> &CompiledQueryCache<C> {
        &self.cache
    }

    /// Typed expression builder for this entity.
    pub fn criteria(&self) -> Criteria<'_> {
        Criteria::new(&self.schema)
    }

    /// Documents matching `filter`.
    pub fn find(&self, filter: Expression) -> Reader<'_, C, S> {
        Reader::new(self, self.criteria().query().with_filter(filter))
    }

    /// Every document.
    pub fn find_all(&self) -> Reader<'_, C, S> {
        Reader::new(self, self.criteria().query())
    }

    /// Documents matching a textual filter (`age >= 18 AND name IN ('a')`).
    pub fn find_where(&self, filter: &str) -> ExpressionResult<Reader<'_, C, S>> {
        let filter = FilterParser::parse(&self.criteria(), filter)?;
        Ok(self.find(filter))
    }

    /// Reader over a full `SELECT` statement.
    pub fn query(&self, sql: &str) -> ExpressionResult<Reader<'_, C, S>> {
        let query = FilterParser::parse_query(&self.schema, sql)?;
        Ok(Reader::new(self, query))
    }

    /// Reader over an already built query.
    pub fn reader(&self, query: Query) -> Reader<'_, C, S> {
        Reader::new(self, query)
    }
}
