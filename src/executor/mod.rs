//! Execution core.
//!
//! Runs a [`CompiledQuery`] on a [`BackendSession`] and exposes the results
//! as a [`LazySequence`] of [`Tuple`]s. Rows are pulled from the backend
//! only as the sequence is consumed.
//!
//! [`CompiledQuery`]: crate::compiler::CompiledQuery

mod error;
mod execution;
mod mapper;
mod session;
mod tuple;

pub use error::{QueryError, QueryResult};
pub use execution::execute;
pub use mapper::{LazySequence, Projected};
pub use session::{BackendError, BackendSession, RawDocumentStream};
pub use tuple::{FromTuple, FromValue, MapperFunction, Tuple};
