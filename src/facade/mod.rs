//! Consumption styles over one [`LazySequence`].
//!
//! Each façade is derived from a sequence through [`Facade::from_sequence`]
//! and adds no query or mapping logic of its own.

mod future;
mod publisher;
mod stream;

pub use future::FutureFetcher;
pub use publisher::{Publisher, Subscriber, Subscription};
pub use stream::{CancelHandle, CancellableStream, StreamFetcher};

use crate::executor::LazySequence;

/// A consumption style derived from a lazy sequence.
pub trait Facade<R>: Sized {
    fn from_sequence(sequence: LazySequence<R>) -> Self;
}
