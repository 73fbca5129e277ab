//! Elasticsearch query DSL compiler.
//!
//! Predicates become filter-context clauses. The whole predicate is wrapped
//! in `constant_score` unless ranking is requested, so the matched set
//! never depends on relevance scoring.
//!
//! Quantifier translation:
//!
//! | predicate            | scalar list                | nested list                                   |
//! |----------------------|----------------------------|-----------------------------------------------|
//! | `any(p)`             | `p` on the list field      | `nested { p }`                                |
//! | `all(p)`             | unsupported                | `must_not [ nested { must_not [ p ] } ]`      |
//! | `size = 0`           | `must_not [ exists ]`      | `must_not [ nested { match_all } ]`           |
//! | `size > 0`           | `exists`                   | `nested { match_all }`                        |
//! | other sizes          | painless script            | unsupported                                   |
//!
//! Arrays of scalars are indexed as multi-valued fields, so a positive
//! leaf query on the field already means "some element matches". Element
//! predicates that are not positive leaves (negations, conjunctions) would
//! change meaning and are rejected.

use serde_json::{json, Value as Json};

use super::error::{CompileError, CompileResult};
use super::mapping::{FieldMapping, Mappings};
use super::scope::{Resolved, Scope};
use super::QueryCompiler;
use crate::catalog::{EntitySchema, FieldType};
use crate::expression::{
    ComparisonOp, Expression, ExpressionVisitor, LogicalOp, Path, Quantifier, Query,
    SortDirection, Value,
};

const BACKEND: &str = "elasticsearch";

/// Compiles queries into an Elasticsearch search request body.
#[derive(Debug, Clone, Default)]
pub struct ElasticsearchCompiler {
    mappings: Option<Mappings>,
}

impl ElasticsearchCompiler {
    /// Compiler deriving field mappings from the schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiler using explicit index mappings.
    pub fn with_mappings(mappings: Mappings) -> Self {
        Self { mappings: Some(mappings) }
    }
}

impl QueryCompiler for ElasticsearchCompiler {
    type Native = Json;

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn compile_native(&self, query: &Query, schema: &EntitySchema) -> CompileResult<Json> {
        let derived;
        let mappings = match &self.mappings {
            Some(m) => m,
            None => {
                derived = Mappings::from_schema(schema);
                &derived
            }
        };
        let root = Scope::root(schema);

        let predicate = match &query.filter {
            Some(filter) => filter.accept(&mut FilterVisitor {
                mappings,
                scope: root.clone(),
                scalar_list: None,
            })?,
            None => json!({ "match_all": {} }),
        };

        let wrapped = if query.ranking {
            json!({ "bool": { "must": [predicate] } })
        } else {
            json!({ "constant_score": { "filter": predicate } })
        };

        let mut body = serde_json::Map::new();
        body.insert("query".into(), wrapped);

        if !query.sort.is_empty() {
            let sort = query
                .sort
                .iter()
                .map(|s| {
                    let resolved = root.resolve_scalar(&s.path, BACKEND)?;
                    let field = exact_field(mappings, &resolved)?;
                    let order = match s.direction {
                        SortDirection::Ascending => "asc",
                        SortDirection::Descending => "desc",
                    };
                    Ok(json!({ field: { "order": order } }))
                })
                .collect::<CompileResult<Vec<_>>>()?;
            body.insert("sort".into(), Json::Array(sort));
        }

        if let Some(projection) = &query.projection {
            let source = projection
                .fields
                .iter()
                .map(|f| root.resolve(&f.path, BACKEND).map(|r| Json::String(r.dotted())))
                .collect::<CompileResult<Vec<_>>>()?;
            body.insert("_source".into(), Json::Array(source));
        }

        if let Some(offset) = query.offset {
            body.insert("from".into(), json!(offset));
        }
        if let Some(limit) = query.limit {
            body.insert("size".into(), json!(limit));
        }

        Ok(Json::Object(body))
    }
}

/// Field name for exact-match and sort clauses.
fn exact_field(mappings: &Mappings, resolved: &Resolved<'_>) -> CompileResult<String> {
    let path = resolved.dotted();
    match mappings.get(&path) {
        None => Err(CompileError::field_mapping(&path, BACKEND, "no index mapping")),
        Some(FieldMapping::Text { keyword: Some(sub) }) => Ok(format!("{}.{}", path, sub)),
        Some(FieldMapping::Text { keyword: None }) => Err(CompileError::field_mapping(
            &path,
            BACKEND,
            "analyzed text field has no keyword sub-field",
        )),
        Some(FieldMapping::Object) | Some(FieldMapping::Nested) => Err(
            CompileError::field_mapping(&path, BACKEND, "object fields hold no comparable value"),
        ),
        Some(_) => Ok(path),
    }
}

fn must_not(query: Json) -> Json {
    json!({ "bool": { "must_not": [query] } })
}

fn exists(field: &str) -> Json {
    json!({ "exists": { "field": field } })
}

struct FilterVisitor<'a> {
    mappings: &'a Mappings,
    scope: Scope<'a>,
    /// Set while compiling the element predicate of a scalar list.
    scalar_list: Option<String>,
}

impl<'a> FilterVisitor<'a> {
    fn leaf(&self, path: &Path) -> CompileResult<(Resolved<'a>, String)> {
        let resolved = self.scope.resolve_scalar(path, BACKEND)?;
        let field = exact_field(self.mappings, &resolved)?;
        Ok((resolved, field))
    }

    fn is_nested(&self, list: &Resolved<'_>) -> bool {
        matches!(self.mappings.get(&list.dotted()), Some(FieldMapping::Nested))
    }

    /// Compile `inner` against the elements of `list`.
    fn element_query(&self, list: &Resolved<'a>, inner: &Expression) -> CompileResult<Json> {
        let mut visitor = FilterVisitor {
            mappings: self.mappings,
            scope: self.scope.enter(list),
            scalar_list: (!self.is_nested(list)).then(|| list.dotted()),
        };
        inner.accept(&mut visitor)
    }

    fn nested_query(path: &str, query: Json) -> Json {
        json!({ "nested": { "path": path, "query": query } })
    }

    fn size_query(&self, list: &Resolved<'a>, op: ComparisonOp, size: usize) -> CompileResult<Json> {
        let path = list.dotted();
        let nested = self.is_nested(list);
        let non_empty = if nested {
            Self::nested_query(&path, json!({ "match_all": {} }))
        } else {
            exists(&path)
        };
        match (op, size) {
            (ComparisonOp::Eq, 0) | (ComparisonOp::Lte, 0) | (ComparisonOp::Lt, 1) => {
                Ok(must_not(non_empty))
            }
            (ComparisonOp::Gt, 0) | (ComparisonOp::Gte, 1) | (ComparisonOp::Ne, 0) => Ok(non_empty),
            (ComparisonOp::Lt, 0) => Ok(json!({ "match_none": {} })),
            (ComparisonOp::Gte, 0) => Ok(json!({ "match_all": {} })),
            _ if nested => Err(CompileError::operator(
                format!("size {} {} on nested field {}", op, size, path),
                BACKEND,
            )),
            _ => {
                let field = exact_field(self.mappings, list)?;
                let symbol = match op {
                    ComparisonOp::Eq => "==",
                    ComparisonOp::Ne => "!=",
                    other => other.symbol(),
                };
                Ok(json!({
                    "script": {
                        "script": {
                            "source": format!("doc['{}'].size() {} params.size", field, symbol),
                            "params": { "size": size }
                        }
                    }
                }))
            }
        }
    }
}

/// Whether `expr` keeps its meaning when applied to a multi-valued field.
fn is_existential(expr: &Expression) -> bool {
    match expr {
        Expression::Path(_) => true,
        Expression::Literal(_) => true,
        Expression::Comparison { op, value, .. } => *op != ComparisonOp::Ne && !value.is_null(),
        Expression::Membership { negated, .. } => !negated,
        Expression::Logical { op: LogicalOp::Or, operands } => operands.iter().all(is_existential),
        Expression::Logical { .. } | Expression::Collection { .. } => false,
    }
}

impl ExpressionVisitor for FilterVisitor<'_> {
    type Output = CompileResult<Json>;

    fn visit_path(&mut self, path: &Path) -> Self::Output {
        let (resolved, field) = self.leaf(path)?;
        match resolved.field_type {
            FieldType::Boolean => Ok(json!({ "term": { field: true } })),
            other => Err(CompileError::operator(
                format!("{} field {} used as a predicate", other, resolved.absolute),
                BACKEND,
            )),
        }
    }

    fn visit_literal(&mut self, value: &Value) -> Self::Output {
        match value {
            // Some element exists only when the list is non-empty.
            Value::Boolean(true) => Ok(match &self.scalar_list {
                Some(list) => exists(list),
                None => json!({ "match_all": {} }),
            }),
            Value::Boolean(false) => Ok(json!({ "match_none": {} })),
            other => Err(CompileError::operator(
                format!("{} literal used as a predicate", other.kind_name()),
                BACKEND,
            )),
        }
    }

    fn visit_comparison(&mut self, op: ComparisonOp, path: &Path, value: &Value) -> Self::Output {
        let (resolved, field) = self.leaf(path)?;
        let value = resolved.check_comparison(op, value)?;
        if value.is_null() {
            let present = exists(&resolved.dotted());
            return match op {
                ComparisonOp::Eq => Ok(must_not(present)),
                ComparisonOp::Ne => Ok(present),
                other => Err(CompileError::operator(format!("{} null", other), BACKEND)),
            };
        }
        let literal = value.to_json();
        let query = match op {
            ComparisonOp::Eq => json!({ "term": { field: literal } }),
            ComparisonOp::Ne => must_not(json!({ "term": { field: literal } })),
            ComparisonOp::Gt => json!({ "range": { field: { "gt": literal } } }),
            ComparisonOp::Gte => json!({ "range": { field: { "gte": literal } } }),
            ComparisonOp::Lt => json!({ "range": { field: { "lt": literal } } }),
            ComparisonOp::Lte => json!({ "range": { field: { "lte": literal } } }),
        };
        Ok(query)
    }

    fn visit_membership(&mut self, path: &Path, values: &[Value], negated: bool) -> Self::Output {
        let (resolved, field) = self.leaf(path)?;
        let values = resolved.check_membership(values)?;
        let literals: Vec<Json> = values.iter().map(Value::to_json).collect();
        let terms = json!({ "terms": { field: literals } });
        Ok(if negated { must_not(terms) } else { terms })
    }

    fn visit_logical(&mut self, op: LogicalOp, operands: &[Expression]) -> Self::Output {
        let compiled = operands
            .iter()
            .map(|e| e.accept(self))
            .collect::<CompileResult<Vec<_>>>()?;
        match op {
            LogicalOp::And => Ok(json!({ "bool": { "filter": compiled } })),
            LogicalOp::Or => Ok(json!({ "bool": { "should": compiled, "minimum_should_match": 1 } })),
            LogicalOp::Not => match compiled.as_slice() {
                [single] => Ok(must_not(single.clone())),
                _ => Err(CompileError::operator(
                    format!("not over {} operands", compiled.len()),
                    BACKEND,
                )),
            },
        }
    }

    fn visit_collection(&mut self, path: &Path, quantifier: &Quantifier) -> Self::Output {
        let list = self.scope.resolve_list(path, BACKEND, quantifier.name())?;
        let nested = self.is_nested(&list);
        match quantifier {
            Quantifier::Any(inner) if nested => {
                let query = self.element_query(&list, inner)?;
                Ok(Self::nested_query(&list.dotted(), query))
            }
            Quantifier::Any(inner) => {
                if !is_existential(inner) {
                    return Err(CompileError::operator(
                        format!("any({}) on scalar list {}", inner, list.absolute),
                        BACKEND,
                    ));
                }
                self.element_query(&list, inner)
            }
            Quantifier::All(inner) if nested => {
                let query = self.element_query(&list, inner)?;
                Ok(must_not(Self::nested_query(&list.dotted(), must_not(query))))
            }
            Quantifier::All(_) => Err(CompileError::operator(
                format!("all on scalar list {}", list.absolute),
                BACKEND,
            )),
            Quantifier::Size { op, size } => self.size_query(&list, *op, *size),
        }
    }
}
