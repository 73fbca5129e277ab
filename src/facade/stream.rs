//! Cancellable pull streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{AbortHandle, Abortable, BoxStream, Stream, StreamExt};
use tracing::debug;

use super::Facade;
use crate::executor::{LazySequence, QueryResult};

/// Derives cancellable streams from a sequence.
#[derive(Debug, Clone)]
pub struct StreamFetcher<R> {
    sequence: LazySequence<R>,
}

impl<R> Facade<R> for StreamFetcher<R> {
    fn from_sequence(sequence: LazySequence<R>) -> Self {
        Self { sequence }
    }
}

impl<R: Send + 'static> StreamFetcher<R> {
    /// Open a new execution as a stream and a handle that cancels it.
    pub fn stream(&self) -> (CancellableStream<R>, CancelHandle) {
        let (handle, registration) = AbortHandle::new_pair();
        let inner = Abortable::new(self.sequence.open(), registration);
        (CancellableStream { inner }, CancelHandle { handle })
    }
}

/// Result stream that ends as soon as its [`CancelHandle`] is cancelled.
///
/// Once cancelled the upstream is never polled again.
pub struct CancellableStream<R> {
    inner: Abortable<BoxStream<'static, QueryResult<R>>>,
}

impl<R> Stream for CancellableStream<R> {
    type Item = QueryResult<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Cancels one [`CancellableStream`]. Cloneable across tasks.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    handle: AbortHandle,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if !self.handle.is_aborted() {
            debug!("result stream cancelled");
        }
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(pulled: Arc<AtomicUsize>) -> LazySequence<usize> {
        LazySequence::new(move || {
            let pulled = Arc::clone(&pulled);
            stream::iter(0..10)
                .map(move |n| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(n)
                })
                .boxed()
        })
    }

    #[tokio::test]
    async fn test_cancel_stops_upstream() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let (mut rows, cancel) = counting(pulled.clone()).stream().stream();

        assert_eq!(rows.next().await, Some(Ok(0)));
        assert_eq!(rows.next().await, Some(Ok(1)));
        cancel.cancel();
        assert!(cancel.is_cancelled());

        assert_eq!(rows.next().await, None);
        assert_eq!(rows.next().await, None);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_each_stream_is_independent() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let fetcher = counting(pulled).stream();
        let (first, cancel) = fetcher.stream();
        cancel.cancel();
        assert_eq!(first.collect::<Vec<_>>().await.len(), 0);

        let (second, _) = fetcher.stream();
        assert_eq!(second.collect::<Vec<_>>().await.len(), 10);
    }
}
