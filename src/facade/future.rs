//! Single-result futures.

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};

use super::Facade;
use crate::executor::{LazySequence, QueryError, QueryResult};

/// Resolves a sequence to one value (or a collected `Vec`).
#[derive(Debug, Clone)]
pub struct FutureFetcher<R> {
    sequence: LazySequence<R>,
}

impl<R> Facade<R> for FutureFetcher<R> {
    fn from_sequence(sequence: LazySequence<R>) -> Self {
        Self { sequence }
    }
}

impl<R: Send + 'static> FutureFetcher<R> {
    /// Exactly one row.
    ///
    /// Fails with `NoSuchElement` on an empty sequence and `TooManyElements`
    /// when a second row (or row error) follows. Only the first two items
    /// are pulled.
    pub fn one(&self) -> BoxFuture<'static, QueryResult<R>> {
        let one_or_none = self.one_or_none();
        async move { one_or_none.await?.ok_or(QueryError::NoSuchElement) }.boxed()
    }

    /// At most one row.
    pub fn one_or_none(&self) -> BoxFuture<'static, QueryResult<Option<R>>> {
        let mut rows = self.sequence.open();
        async move {
            let first = match rows.next().await {
                None => return Ok(None),
                Some(first) => first?,
            };
            match rows.next().await {
                None => Ok(Some(first)),
                Some(Err(err)) if err.is_fatal() => Err(err),
                Some(_) => Err(QueryError::TooManyElements),
            }
        }
        .boxed()
    }

    /// Whether the sequence yields anything. A row error still counts as a
    /// row; fatal errors propagate.
    pub fn exists(&self) -> BoxFuture<'static, QueryResult<bool>> {
        let mut rows = self.sequence.open();
        async move {
            match rows.next().await {
                None => Ok(false),
                Some(Err(err)) if err.is_fatal() => Err(err),
                Some(_) => Ok(true),
            }
        }
        .boxed()
    }

    /// Every row. The first error of any kind aborts the collection.
    pub fn fetch(&self) -> BoxFuture<'static, QueryResult<Vec<R>>> {
        self.sequence.open().try_collect().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::BackendError;

    fn row_error(row: usize) -> QueryError {
        QueryError::ProjectionExtraction {
            row,
            path: "name".into(),
            reason: "missing field".into(),
        }
    }

    #[tokio::test]
    async fn test_one() {
        let single = LazySequence::from_rows(vec![Ok(7i64)]).future();
        assert_eq!(single.one().await, Ok(7));

        let empty = LazySequence::<i64>::from_rows(vec![]).future();
        assert_eq!(empty.one().await, Err(QueryError::NoSuchElement));
        assert_eq!(empty.one_or_none().await, Ok(None));

        let two = LazySequence::from_rows(vec![Ok(1i64), Ok(2)]).future();
        assert_eq!(two.one().await, Err(QueryError::TooManyElements));

        let trailing_row_error = LazySequence::from_rows(vec![Ok(1i64), Err(row_error(1))]).future();
        assert_eq!(trailing_row_error.one().await, Err(QueryError::TooManyElements));
    }

    #[tokio::test]
    async fn test_one_propagates_fatal_errors() {
        let fatal = QueryError::Backend(BackendError::Connection("reset".into()));
        let seq = LazySequence::from_rows(vec![Ok(1i64), Err(fatal.clone())]).future();
        assert_eq!(seq.one().await, Err(fatal));

        let first = LazySequence::<i64>::from_rows(vec![Err(row_error(0))]).future();
        assert_eq!(first.one().await, Err(row_error(0)));
    }

    #[tokio::test]
    async fn test_exists_and_fetch() {
        let seq = LazySequence::from_rows(vec![Err(row_error(0)), Ok(2i64)]).future();
        assert_eq!(seq.exists().await, Ok(true));
        assert_eq!(seq.fetch().await, Err(row_error(0)));

        let ok = LazySequence::from_rows(vec![Ok(1i64), Ok(2)]).future();
        assert_eq!(ok.fetch().await, Ok(vec![1, 2]));
        assert_eq!(LazySequence::<i64>::from_rows(vec![]).future().exists().await, Ok(false));
    }
}
