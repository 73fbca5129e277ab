//! Query refinement and consumption.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::instrument;

use super::Repository;
use crate::compiler::{self, CompiledQuery, QueryCompiler};
use crate::executor::{
    execute, BackendSession, FromTuple, LazySequence, Projected, QueryError, QueryResult, Tuple,
};
use crate::expression::{ExpressionResult, Query, SortDirection};

/// A query bound to a repository.
pub struct Reader<'a, C: QueryCompiler, S> {
    repository: &'a Repository<C, S>,
    query: Query,
}

impl<'a, C, S> Reader<'a, C, S>
where
    C: QueryCompiler,
    S: BackendSession<Native = C::Native> + 'static,
{
    pub(super) fn new(repository: &'a Repository<C, S>, query: Query) -> Self {
        Self { repository, query }
    }

    /// The query as configured so far (without repository defaults).
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Append a sort key.
    pub fn order_by(mut self, path: &str, direction: SortDirection) -> ExpressionResult<Self> {
        let sort = self.repository.criteria().sort(path, direction)?;
        self.query = self.query.with_sort(sort);
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query = self.query.with_limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query = self.query.with_offset(offset);
        self
    }

    /// Request relevance ranking.
    pub fn ranked(mut self, ranking: bool) -> Self {
        self.query = self.query.with_ranking(ranking);
        self
    }

    /// Project `paths` and type each row as `T`.
    ///
    /// Fails before execution when `T` does not fit the projection.
    pub fn select<T, I, P>(self, paths: I) -> QueryResult<Projected<T>>
    where
        T: FromTuple + Send + 'static,
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let projection = self.repository.criteria().projection(paths)?;
        T::check(&projection)?;
        let query = self.query.with_projection(projection.clone());
        let tuples = self.repository.run(&query)?;
        Ok(Projected::new(tuples, &projection)?)
    }

    /// Whole documents. Any projection on the query is ignored.
    pub fn documents(self) -> QueryResult<LazySequence<serde_json::Value>> {
        let tuples = self.repository.run(&self.unprojected())?;
        Ok(tuples.try_map(|tuple| tuple.get::<serde_json::Value>(0)))
    }

    /// Whole documents deserialized as `E`. A document that does not
    /// deserialize is a row error.
    pub fn entities<E>(self) -> QueryResult<LazySequence<E>>
    where
        E: DeserializeOwned + Send + 'static,
    {
        let tuples = self.repository.run(&self.unprojected())?;
        Ok(tuples.try_map(|tuple| {
            let doc = tuple.get::<serde_json::Value>(0)?;
            serde_json::from_value(doc).map_err(|e| QueryError::ProjectionExtraction {
                row: tuple.row(),
                path: "$".into(),
                reason: e.to_string(),
            })
        }))
    }

    fn unprojected(&self) -> Query {
        let mut query = self.query.clone();
        query.projection = None;
        query
    }

    /// Compiled native query as JSON.
    pub fn explain(&self) -> QueryResult<serde_json::Value> {
        Ok(self.repository.compiled(&self.query)?.to_json())
    }
}

impl<C, S> Repository<C, S>
where
    C: QueryCompiler,
    S: BackendSession<Native = C::Native> + 'static,
{
    /// `query` with repository defaults applied.
    fn effective(&self, query: &Query) -> Query {
        let mut query = query.clone();
        query.ranking |= self.config.ranking;
        if query.limit.is_none() {
            query.limit = self.config.default_limit;
        }
        query
    }

    fn compiled(&self, query: &Query) -> QueryResult<Arc<CompiledQuery<C::Native>>> {
        let query = self.effective(query);
        if self.config.cache_compiled {
            return Ok(self.cache.get_or_compile(&query, &self.schema)?);
        }
        Ok(Arc::new(compiler::compile(self.cache.compiler(), &query, &self.schema)?))
    }

    #[instrument(skip_all, fields(entity = %query.entity))]
    fn run(&self, query: &Query) -> QueryResult<LazySequence<Tuple>> {
        let compiled = self.compiled(query)?;
        let session: Arc<dyn BackendSession<Native = C::Native>> = self.session.clone();
        Ok(execute(compiled, session))
    }
}

