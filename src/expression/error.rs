//! Expression construction errors.

use thiserror::Error;

/// Result type for expression and query construction.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Errors raised while building expressions and queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("projection has {actual} column(s) but the mapper expects {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(String),

    #[error("empty filter")]
    EmptyFilter,

    #[error("projection must name at least one field")]
    EmptyProjection,
}

impl ExpressionError {
    pub(crate) fn mismatch(
        path: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        ExpressionError::TypeMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<sqlparser::parser::ParserError> for ExpressionError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        ExpressionError::Syntax(e.to_string())
    }
}
