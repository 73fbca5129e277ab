//! SQL compiler for flat relational tables.
//!
//! Produces a `SELECT` with positional `?` parameters. Leaves on nullable
//! columns are rendered so they never evaluate to SQL `NULL`, which keeps
//! `NOT` two-valued and consistent with the other backends: `ne` and
//! `not in` keep rows where the column is null, and `eq`/ranges drop them.

use serde::Serialize;

use super::error::{CompileError, CompileResult};
use super::scope::{Resolved, Scope};
use super::QueryCompiler;
use crate::catalog::{EntitySchema, FieldType};
use crate::expression::{
    ComparisonOp, Expression, ExpressionVisitor, LogicalOp, Path, Quantifier, Query,
    SortDirection, Value,
};

const BACKEND: &str = "sql";

/// Parameterized SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compiles queries into parameterized SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCompiler;

impl SqlCompiler {
    pub fn new() -> Self {
        Self
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Column name for a resolved path. Relational rows are flat.
fn column(resolved: &Resolved<'_>) -> CompileResult<String> {
    match resolved.absolute.segments() {
        [name] if !matches!(resolved.field_type, FieldType::Object(_)) => Ok(quote(name)),
        [_] => Err(CompileError::field_mapping(
            resolved.dotted(),
            BACKEND,
            "object columns are not supported",
        )),
        _ => Err(CompileError::field_mapping(
            resolved.dotted(),
            BACKEND,
            "relational rows have no nested fields",
        )),
    }
}

impl QueryCompiler for SqlCompiler {
    type Native = SqlQuery;

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn compile_native(&self, query: &Query, schema: &EntitySchema) -> CompileResult<SqlQuery> {
        let root = Scope::root(schema);

        let columns = match &query.projection {
            Some(projection) => projection
                .fields
                .iter()
                .map(|f| column(&root.resolve(&f.path, BACKEND)?))
                .collect::<CompileResult<Vec<_>>>()?
                .join(", "),
            None => "*".to_string(),
        };
        let mut sql = format!("SELECT {} FROM {}", columns, quote(&query.entity));

        let mut visitor = SqlVisitor {
            scope: root.clone(),
            params: Vec::new(),
        };
        if let Some(filter) = &query.filter {
            let condition = filter.accept(&mut visitor)?;
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }

        if !query.sort.is_empty() {
            let keys = query
                .sort
                .iter()
                .map(|s| {
                    let col = column(&root.resolve_scalar(&s.path, BACKEND)?)?;
                    Ok(match s.direction {
                        SortDirection::Ascending => format!("{} ASC", col),
                        SortDirection::Descending => format!("{} DESC", col),
                    })
                })
                .collect::<CompileResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite spelling of "no limit".
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        Ok(SqlQuery {
            sql,
            params: visitor.params,
        })
    }
}

struct SqlVisitor<'a> {
    scope: Scope<'a>,
    params: Vec<Value>,
}

impl<'a> SqlVisitor<'a> {
    fn leaf(&self, path: &Path) -> CompileResult<(Resolved<'a>, String, bool)> {
        let resolved = self.scope.resolve_scalar(path, BACKEND)?;
        let nullable = resolved.cardinality.allows_absence();
        let col = column(&resolved)?;
        Ok((resolved, col, nullable))
    }

    fn bind(&mut self, value: &Value) -> &'static str {
        self.params.push(value.clone());
        "?"
    }
}

impl ExpressionVisitor for SqlVisitor<'_> {
    type Output = CompileResult<String>;

    fn visit_path(&mut self, path: &Path) -> Self::Output {
        let resolved = self.scope.resolve_scalar(path, BACKEND)?;
        if resolved.field_type != &FieldType::Boolean {
            return Err(CompileError::operator(
                format!("{} field {} used as a predicate", resolved.field_type, resolved.absolute),
                BACKEND,
            ));
        }
        let col = column(&resolved)?;
        let p = self.bind(&Value::Boolean(true));
        if resolved.cardinality.allows_absence() {
            Ok(format!("({col} = {p} AND {col} IS NOT NULL)"))
        } else {
            Ok(format!("{col} = {p}"))
        }
    }

    fn visit_literal(&mut self, value: &Value) -> Self::Output {
        match value {
            Value::Boolean(true) => Ok("1 = 1".into()),
            Value::Boolean(false) => Ok("1 = 0".into()),
            other => Err(CompileError::operator(
                format!("{} literal used as a predicate", other.kind_name()),
                BACKEND,
            )),
        }
    }

    fn visit_comparison(&mut self, op: ComparisonOp, path: &Path, value: &Value) -> Self::Output {
        let (resolved, col, nullable) = self.leaf(path)?;
        let value = resolved.check_comparison(op, value)?;
        if value.is_null() {
            return match op {
                ComparisonOp::Eq => Ok(format!("{} IS NULL", col)),
                ComparisonOp::Ne => Ok(format!("{} IS NOT NULL", col)),
                other => Err(CompileError::operator(format!("{} null", other), BACKEND)),
            };
        }
        let p = self.bind(&value);
        let condition = format!("{} {} {}", col, op.symbol(), p);
        Ok(match (nullable, op) {
            (false, _) => condition,
            (true, ComparisonOp::Ne) => format!("({} OR {} IS NULL)", condition, col),
            (true, _) => format!("({} AND {} IS NOT NULL)", condition, col),
        })
    }

    fn visit_membership(&mut self, path: &Path, values: &[Value], negated: bool) -> Self::Output {
        let (resolved, col, nullable) = self.leaf(path)?;
        let values = resolved.check_membership(values)?;
        if values.is_empty() {
            return Ok(if negated { "1 = 1" } else { "1 = 0" }.into());
        }
        let placeholders: Vec<&str> = values.iter().map(|v| self.bind(v)).collect();
        let list = placeholders.join(", ");
        Ok(match (nullable, negated) {
            (false, false) => format!("{} IN ({})", col, list),
            (false, true) => format!("{} NOT IN ({})", col, list),
            (true, false) => format!("({} IN ({}) AND {} IS NOT NULL)", col, list, col),
            (true, true) => format!("({} NOT IN ({}) OR {} IS NULL)", col, list, col),
        })
    }

    fn visit_logical(&mut self, op: LogicalOp, operands: &[Expression]) -> Self::Output {
        let parts = operands
            .iter()
            .map(|e| e.accept(self))
            .collect::<CompileResult<Vec<_>>>()?;
        match op {
            LogicalOp::And if parts.is_empty() => Ok("1 = 1".into()),
            LogicalOp::Or if parts.is_empty() => Ok("1 = 0".into()),
            LogicalOp::And => Ok(format!("({})", parts.join(" AND "))),
            LogicalOp::Or => Ok(format!("({})", parts.join(" OR "))),
            LogicalOp::Not => match parts.as_slice() {
                [single] => Ok(format!("NOT ({})", single)),
                _ => Err(CompileError::operator(
                    format!("not over {} operands", parts.len()),
                    BACKEND,
                )),
            },
        }
    }

    fn visit_collection(&mut self, path: &Path, quantifier: &Quantifier) -> Self::Output {
        Err(CompileError::operator(
            format!("{} on {}", quantifier.name(), path),
            BACKEND,
        ))
    }
}
