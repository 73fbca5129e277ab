//! Expression and query model.
//!
//! Expressions are immutable trees with structural equality. Compilers walk
//! them through [`ExpressionVisitor`]. Typed construction goes through
//! [`Criteria`], which resolves every path against an [`EntitySchema`]
//! and rejects incompatible literals at build time.
//!
//! [`EntitySchema`]: crate::catalog::EntitySchema

mod ast;
mod builder;
mod error;
mod parser;
mod query;
mod value;
mod visitor;

pub use ast::{ComparisonOp, Expression, LogicalOp, Path, Quantifier};
pub use builder::{Criteria, FieldRef};
pub(crate) use builder::{check_comparison, check_membership};
pub use error::{ExpressionError, ExpressionResult};
pub use parser::FilterParser;
pub use query::{ProjectedField, Projection, Query, Sort, SortDirection};
pub use value::Value;
pub use visitor::ExpressionVisitor;
