//! Lazy result sequences and tuple mapping.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use super::error::QueryResult;
use super::tuple::{FromTuple, MapperFunction, Tuple};
use crate::expression::{ExpressionResult, Projection};
use crate::facade::{Facade, FutureFetcher, Publisher, StreamFetcher};

type StreamFactory<R> = dyn Fn() -> BoxStream<'static, QueryResult<R>> + Send + Sync;

/// A re-openable, lazily evaluated sequence of results.
///
/// Nothing runs until [`LazySequence::open`] is called and the returned
/// stream is polled. Each `open` is an independent execution.
pub struct LazySequence<R> {
    factory: Arc<StreamFactory<R>>,
}

impl<R> Clone for LazySequence<R> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<R> fmt::Debug for LazySequence<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySequence").finish_non_exhaustive()
    }
}

impl<R: Send + 'static> LazySequence<R> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> BoxStream<'static, QueryResult<R>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Sequence over fixed rows. Every open replays them.
    pub fn from_rows(rows: Vec<QueryResult<R>>) -> Self
    where
        R: Clone + Sync,
    {
        let rows = Arc::new(rows);
        Self::new(move || stream::iter(rows.as_ref().clone()).boxed())
    }

    /// Start a new execution.
    pub fn open(&self) -> BoxStream<'static, QueryResult<R>> {
        (self.factory)()
    }

    /// Transform every successful row. Errors pass through unchanged.
    pub fn map<U, F>(self, f: F) -> LazySequence<U>
    where
        U: Send + 'static,
        F: Fn(R) -> U + Send + Sync + 'static,
    {
        self.try_map(move |row| Ok(f(row)))
    }

    /// Fallible transform of every successful row.
    pub fn try_map<U, F>(self, f: F) -> LazySequence<U>
    where
        U: Send + 'static,
        F: Fn(R) -> QueryResult<U> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        LazySequence::new(move || {
            let f = Arc::clone(&f);
            self.open().map(move |row| row.and_then(|r| f(r))).boxed()
        })
    }

    /// Adapt to a consumption style.
    pub fn into_facade<F: Facade<R>>(self) -> F {
        F::from_sequence(self)
    }

    pub fn future(self) -> FutureFetcher<R> {
        self.into_facade()
    }

    pub fn stream(self) -> StreamFetcher<R> {
        self.into_facade()
    }

    pub fn publisher(self) -> Publisher<R> {
        self.into_facade()
    }
}

/// Tuples of a projected query, typed as `T` at the projection's arity.
pub struct Projected<T> {
    tuples: LazySequence<Tuple>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Projected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projected")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: FromTuple + Send + 'static> Projected<T> {
    /// Fails when `T` does not fit the projection's arity or column types.
    pub fn new(tuples: LazySequence<Tuple>, projection: &Projection) -> ExpressionResult<Self> {
        T::check(projection)?;
        Ok(Self {
            tuples,
            _marker: PhantomData,
        })
    }

    /// Map each tuple through a function taking one argument per column.
    pub fn map<R, F>(self, f: F) -> LazySequence<R>
    where
        R: Send + 'static,
        F: MapperFunction<T, R>,
    {
        self.tuples
            .try_map(move |tuple| T::from_tuple(&tuple).map(|args| f.call(args)))
    }

    /// Map each tuple through a function reading it positionally.
    pub fn map_tuple<R, F>(self, f: F) -> LazySequence<R>
    where
        R: Send + 'static,
        F: Fn(&Tuple) -> QueryResult<R> + Send + Sync + 'static,
    {
        self.tuples.try_map(move |tuple| f(&tuple))
    }

    /// Rows as typed tuples.
    pub fn typed(self) -> LazySequence<T> {
        self.tuples.try_map(|tuple| T::from_tuple(&tuple))
    }

    /// Untyped tuples.
    pub fn tuples(self) -> LazySequence<Tuple> {
        self.tuples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, FieldType};
    use crate::executor::QueryError;
    use crate::expression::{ExpressionError, Path, ProjectedField, Value};
    use futures::TryStreamExt;

    fn people() -> (LazySequence<Tuple>, Projection) {
        let columns: Arc<[Path]> = vec![Path::parse("name"), Path::parse("age")].into();
        let rows = vec![
            Ok(Tuple::new(0, columns.clone(), vec!["Bob".into(), Value::Integer(30)])),
            Ok(Tuple::new(1, columns, vec!["Cara".into(), Value::Integer(41)])),
        ];
        let projection = Projection::new(vec![
            ProjectedField {
                path: Path::parse("name"),
                field_type: FieldType::Text,
                cardinality: Cardinality::Required,
            },
            ProjectedField {
                path: Path::parse("age"),
                field_type: FieldType::Integer,
                cardinality: Cardinality::Required,
            },
        ]);
        (LazySequence::from_rows(rows), projection)
    }

    #[tokio::test]
    async fn test_positional_and_tuple_view_agree() {
        let (tuples, projection) = people();

        let positional = Projected::<(String, i64)>::new(tuples.clone(), &projection)
            .unwrap()
            .map(|name: String, age: i64| format!("{}:{}", name, age));
        let view = Projected::<(String, i64)>::new(tuples, &projection)
            .unwrap()
            .map_tuple(|t| Ok(format!("{}:{}", t.get::<String>(0)?, t.get::<i64>(1)?)));

        let a: Vec<String> = positional.open().try_collect().await.unwrap();
        let b: Vec<String> = view.open().try_collect().await.unwrap();
        assert_eq!(a, vec!["Bob:30".to_string(), "Cara:41".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_arity_mismatch_rejected_before_execution() {
        let (tuples, projection) = people();
        let err = Projected::<(String,)>::new(tuples, &projection).unwrap_err();
        assert_eq!(err, ExpressionError::ArityMismatch { expected: 1, actual: 2 });
    }

    #[tokio::test]
    async fn test_errors_pass_through_map() {
        let seq = LazySequence::from_rows(vec![Ok(1i64), Err(QueryError::NoSuchElement), Ok(3)]);
        let doubled: Vec<_> = seq.map(|n| n * 2).open().collect().await;
        assert_eq!(doubled, vec![Ok(2), Err(QueryError::NoSuchElement), Ok(6)]);
    }

    #[tokio::test]
    async fn test_reopen_replays() {
        let (tuples, projection) = people();
        let typed = Projected::<(String, i64)>::new(tuples, &projection).unwrap().typed();
        let first: Vec<_> = typed.open().try_collect().await.unwrap();
        let second: Vec<_> = typed.open().try_collect().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[1], ("Cara".to_string(), 41));
    }
}
