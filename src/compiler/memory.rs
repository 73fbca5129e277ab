//! In-memory plan compiler.
//!
//! Lowers a query into a [`MemoryPlan`]: a predicate tree with resolved
//! field types plus sort and paging. The in-memory backend evaluates it
//! directly against JSON documents with exact quantifier semantics.

use serde::Serialize;

use super::error::{CompileError, CompileResult};
use super::scope::Scope;
use super::QueryCompiler;
use crate::catalog::{EntitySchema, FieldType};
use crate::expression::{
    ComparisonOp, Expression, ExpressionVisitor, LogicalOp, Path, Quantifier, Query,
    SortDirection, Value,
};

const BACKEND: &str = "memory";

/// Predicate over one JSON document or list element. Paths are relative
/// to the value being tested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Constant {
        value: bool,
    },
    IsTrue {
        path: Path,
    },
    Compare {
        path: Path,
        cmp: ComparisonOp,
        value: Value,
        field_type: FieldType,
    },
    /// Field missing or null.
    Absent {
        path: Path,
    },
    Present {
        path: Path,
    },
    In {
        path: Path,
        values: Vec<Value>,
        negated: bool,
        field_type: FieldType,
    },
    And {
        operands: Vec<Predicate>,
    },
    Or {
        operands: Vec<Predicate>,
    },
    Not {
        operand: Box<Predicate>,
    },
    Any {
        path: Path,
        predicate: Box<Predicate>,
    },
    /// Vacuously true for an empty or missing list.
    All {
        path: Path,
        predicate: Box<Predicate>,
    },
    Size {
        path: Path,
        cmp: ComparisonOp,
        size: usize,
    },
}

/// One sort key with the type used to order its values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    pub path: Path,
    pub direction: SortDirection,
    pub field_type: FieldType,
}

/// Compiled in-memory query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryPlan {
    pub predicate: Predicate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Compiles queries for the in-memory backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCompiler;

impl MemoryCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl QueryCompiler for MemoryCompiler {
    type Native = MemoryPlan;

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn compile_native(&self, query: &Query, schema: &EntitySchema) -> CompileResult<MemoryPlan> {
        let root = Scope::root(schema);
        let predicate = match &query.filter {
            Some(filter) => filter.accept(&mut PlanVisitor { scope: root.clone() })?,
            None => Predicate::Constant { value: true },
        };
        let sort = query
            .sort
            .iter()
            .map(|s| {
                let resolved = root.resolve_scalar(&s.path, BACKEND)?;
                Ok(SortKey {
                    path: s.path.clone(),
                    direction: s.direction,
                    field_type: resolved.field_type.clone(),
                })
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(MemoryPlan {
            predicate,
            sort,
            offset: query.offset.unwrap_or(0),
            limit: query.limit,
        })
    }
}

struct PlanVisitor<'a> {
    scope: Scope<'a>,
}

impl ExpressionVisitor for PlanVisitor<'_> {
    type Output = CompileResult<Predicate>;

    fn visit_path(&mut self, path: &Path) -> Self::Output {
        let resolved = self.scope.resolve_scalar(path, BACKEND)?;
        match resolved.field_type {
            FieldType::Boolean => Ok(Predicate::IsTrue { path: path.clone() }),
            other => Err(CompileError::operator(
                format!("{} field {} used as a predicate", other, resolved.absolute),
                BACKEND,
            )),
        }
    }

    fn visit_literal(&mut self, value: &Value) -> Self::Output {
        match value {
            Value::Boolean(b) => Ok(Predicate::Constant { value: *b }),
            other => Err(CompileError::operator(
                format!("{} literal used as a predicate", other.kind_name()),
                BACKEND,
            )),
        }
    }

    fn visit_comparison(&mut self, op: ComparisonOp, path: &Path, value: &Value) -> Self::Output {
        let resolved = self.scope.resolve_scalar(path, BACKEND)?;
        let value = resolved.check_comparison(op, value)?;
        if value.is_null() {
            return match op {
                ComparisonOp::Eq => Ok(Predicate::Absent { path: path.clone() }),
                ComparisonOp::Ne => Ok(Predicate::Present { path: path.clone() }),
                other => Err(CompileError::operator(format!("{} null", other), BACKEND)),
            };
        }
        Ok(Predicate::Compare {
            path: path.clone(),
            cmp: op,
            value,
            field_type: resolved.field_type.clone(),
        })
    }

    fn visit_membership(&mut self, path: &Path, values: &[Value], negated: bool) -> Self::Output {
        let resolved = self.scope.resolve_scalar(path, BACKEND)?;
        Ok(Predicate::In {
            path: path.clone(),
            values: resolved.check_membership(values)?,
            negated,
            field_type: resolved.field_type.clone(),
        })
    }

    fn visit_logical(&mut self, op: LogicalOp, operands: &[Expression]) -> Self::Output {
        let mut compiled = operands
            .iter()
            .map(|e| e.accept(self))
            .collect::<CompileResult<Vec<_>>>()?;
        match op {
            LogicalOp::And => Ok(Predicate::And { operands: compiled }),
            LogicalOp::Or => Ok(Predicate::Or { operands: compiled }),
            LogicalOp::Not if compiled.len() == 1 => Ok(Predicate::Not {
                operand: Box::new(compiled.remove(0)),
            }),
            LogicalOp::Not => Err(CompileError::operator(
                format!("not over {} operands", compiled.len()),
                BACKEND,
            )),
        }
    }

    fn visit_collection(&mut self, path: &Path, quantifier: &Quantifier) -> Self::Output {
        let list = self.scope.resolve_list(path, BACKEND, quantifier.name())?;
        let element = |inner: &Expression| {
            inner.accept(&mut PlanVisitor {
                scope: self.scope.enter(&list),
            })
        };
        match quantifier {
            Quantifier::Any(inner) => Ok(Predicate::Any {
                path: path.clone(),
                predicate: Box::new(element(inner)?),
            }),
            Quantifier::All(inner) => Ok(Predicate::All {
                path: path.clone(),
                predicate: Box::new(element(inner)?),
            }),
            Quantifier::Size { op, size } => Ok(Predicate::Size {
                path: path.clone(),
                cmp: *op,
                size: *size,
            }),
        }
    }
}
