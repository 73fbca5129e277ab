//! Backend session contract.

use futures::stream::BoxStream;
use thiserror::Error;

use crate::compiler::CompiledQuery;

/// Lazy stream of raw documents produced by a backend.
pub type RawDocumentStream = BoxStream<'static, Result<serde_json::Value, BackendError>>;

/// Fatal backend failures. Distinct from per-row errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("query rejected: {0}")]
    Rejected(String),
}

/// Executes compiled queries against one backend.
///
/// `execute` must not perform I/O itself: documents are fetched as the
/// returned stream is polled, so a consumer that stops polling stops
/// fetching.
pub trait BackendSession: Send + Sync {
    type Native;

    fn execute(&self, query: &CompiledQuery<Self::Native>) -> RawDocumentStream;
}
