//! criteria - type-checked queries for heterogeneous backends
//!
//! Queries are built as typed expression trees against an entity schema,
//! compiled once into a backend's native form (an Elasticsearch search
//! body, an in-memory plan, or parameterized SQL) and executed as lazy
//! sequences of tuples. Projections of 1 to 8 columns map onto Rust tuples
//! or positional closures, and every result sequence can be consumed as a
//! future, a cancellable stream or a demand-driven publisher.
//!
//! # Example
//!
//! ```
//! use criteria::catalog::{FieldType, SchemaBuilder};
//! use criteria::compiler::{compile, ElasticsearchCompiler};
//! use criteria::expression::Criteria;
//!
//! let schema = SchemaBuilder::new("people")
//!     .add_field("age", FieldType::Integer)
//!     .build()
//!     .unwrap();
//! let c = Criteria::new(&schema);
//! let query = c.query().with_filter(c.field("age").unwrap().gte(18).unwrap());
//! let compiled = compile(&ElasticsearchCompiler::new(), &query, &schema).unwrap();
//! assert_eq!(
//!     compiled.native["query"]["constant_score"]["filter"],
//!     serde_json::json!({ "range": { "age": { "gte": 18 } } })
//! );
//! ```

pub mod backend;
pub mod catalog;
pub mod compiler;
pub mod executor;
pub mod expression;
pub mod facade;
pub mod repository;
