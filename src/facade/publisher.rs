//! Push-based delivery with demand signalling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::Facade;
use crate::executor::{LazySequence, QueryError, QueryResult};

/// Receives the rows of one subscription.
///
/// Row errors arrive through `on_next`; a fatal error ends the
/// subscription through `on_error`, otherwise it ends with `on_complete`.
/// Nothing is delivered after the subscription is cancelled.
pub trait Subscriber<R>: Send + 'static {
    fn on_subscribe(&mut self, _subscription: Subscription) {}

    fn on_next(&mut self, item: QueryResult<R>);

    fn on_error(&mut self, error: QueryError);

    fn on_complete(&mut self);
}

struct Demand {
    pending: Mutex<u64>,
    cancelled: AtomicBool,
    notify: Notify,
}

/// Demand and cancellation handle of one subscription.
#[derive(Clone)]
pub struct Subscription {
    demand: Arc<Demand>,
}

impl Subscription {
    fn new() -> Self {
        Self {
            demand: Arc::new(Demand {
                pending: Mutex::new(0),
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Allow `n` more rows to be pulled and delivered.
    pub fn request(&self, n: u64) {
        if n == 0 || self.is_cancelled() {
            return;
        }
        {
            let mut pending = self.demand.pending.lock();
            *pending = pending.saturating_add(n);
        }
        self.demand.notify.notify_one();
    }

    pub fn cancel(&self) {
        if !self.demand.cancelled.swap(true, Ordering::SeqCst) {
            debug!("subscription cancelled");
        }
        self.demand.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.demand.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for one unit of demand. Returns false once cancelled.
    async fn acquire(&self) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            {
                let mut pending = self.demand.pending.lock();
                if *pending > 0 {
                    *pending -= 1;
                    return true;
                }
            }
            self.demand.notify.notified().await;
        }
    }
}

/// Publishes a sequence to subscribers. Each subscription is a new
/// execution.
#[derive(Debug, Clone)]
pub struct Publisher<R> {
    sequence: LazySequence<R>,
}

impl<R> Facade<R> for Publisher<R> {
    fn from_sequence(sequence: LazySequence<R>) -> Self {
        Self { sequence }
    }
}

impl<R: Send + 'static> Publisher<R> {
    /// Subscribe and start the delivery task on the current tokio runtime.
    ///
    /// Rows are pulled from upstream only against requested demand.
    pub fn subscribe<S: Subscriber<R>>(&self, mut subscriber: S) -> Subscription {
        let subscription = Subscription::new();
        subscriber.on_subscribe(subscription.clone());
        tokio::spawn(drive(self.sequence.open(), subscriber, subscription.clone()));
        subscription
    }
}

async fn drive<R, S>(mut upstream: BoxStream<'static, QueryResult<R>>, mut subscriber: S, subscription: Subscription)
where
    S: Subscriber<R>,
{
    while subscription.acquire().await {
        let item = upstream.next().await;
        if subscription.is_cancelled() {
            break;
        }
        match item {
            None => {
                subscriber.on_complete();
                return;
            }
            Some(Err(err)) if err.is_fatal() => {
                subscriber.on_error(err);
                return;
            }
            Some(item) => subscriber.on_next(item),
        }
    }
    debug!("publisher stopped after cancellation");
}
