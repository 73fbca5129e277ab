//! Query execution errors.

use thiserror::Error;

use super::session::BackendError;
use crate::compiler::CompileError;
use crate::expression::ExpressionError;

/// Result type for query execution.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced while executing a query and consuming its results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// One row could not be projected. The sequence continues.
    #[error("row {row}: cannot extract '{path}': {reason}")]
    ProjectionExtraction {
        row: usize,
        path: String,
        reason: String,
    },

    /// The backend failed. Terminates the sequence.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("expected one element, got none")]
    NoSuchElement,

    #[error("expected one element, got more")]
    TooManyElements,

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),
}

impl QueryError {
    /// Check if the error only concerns one row.
    pub fn is_row_error(&self) -> bool {
        matches!(self, QueryError::ProjectionExtraction { .. })
    }

    /// Check if the error ends the sequence.
    pub fn is_fatal(&self) -> bool {
        !self.is_row_error()
    }
}
