//! Query compilation errors.

use thiserror::Error;

use crate::expression::ExpressionError;

/// Result type for query compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Query compilation errors. Both backend variants are fatal to the query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unsupported field mapping for '{path}' on {backend}: {reason}")]
    UnsupportedFieldMapping {
        path: String,
        backend: String,
        reason: String,
    },

    #[error("unsupported operator '{operator}' on {backend}")]
    UnsupportedOperator { operator: String, backend: String },

    #[error("query targets '{query}' but the schema describes '{schema}'")]
    EntityMismatch { query: String, schema: String },

    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),
}

impl CompileError {
    pub(crate) fn field_mapping(
        path: impl ToString,
        backend: &str,
        reason: impl ToString,
    ) -> Self {
        CompileError::UnsupportedFieldMapping {
            path: path.to_string(),
            backend: backend.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn operator(operator: impl ToString, backend: &str) -> Self {
        CompileError::UnsupportedOperator {
            operator: operator.to_string(),
            backend: backend.to_string(),
        }
    }
}
