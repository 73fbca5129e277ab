//! Textual filters.
//!
//! Parses SQL `WHERE`-style predicates and simple `SELECT` statements with
//! sqlparser and lowers them through [`Criteria`], so parsed expressions get
//! the same type checks as built ones.
//!
//! Beyond plain SQL, `x = ANY(list)` / `x = ALL(list)` become collection
//! predicates over scalar lists and `CARDINALITY(list) op n` becomes a size
//! predicate. String literals compared to date or timestamp fields are
//! parsed as `YYYY-MM-DD` / RFC 3339.

use chrono::{DateTime, NaiveDate, Utc};
use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;

use super::ast::{ComparisonOp, Expression, LogicalOp};
use super::builder::{Criteria, FieldRef};
use super::error::{ExpressionError, ExpressionResult};
use super::query::{Query, SortDirection};
use super::value::Value;
use crate::catalog::{EntitySchema, FieldType};

/// Parser for textual filters and queries.
pub struct FilterParser;

impl FilterParser {
    /// Parse a predicate such as `age >= 18 AND name IN ('a', 'b')`.
    pub fn parse(criteria: &Criteria<'_>, text: &str) -> ExpressionResult<Expression> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ExpressionError::EmptyFilter);
        }
        // Wrapping in a statement makes sqlparser reject trailing input.
        let sql = format!("SELECT * FROM t WHERE {}", text);
        let select = Self::parse_select(&sql)?;
        let selection = select
            .body_selection()
            .ok_or(ExpressionError::EmptyFilter)?;
        Self::convert_expr(criteria, selection)
    }

    /// Parse `SELECT cols FROM entity [WHERE ..] [ORDER BY ..] [LIMIT n] [OFFSET n]`.
    pub fn parse_query(schema: &EntitySchema, text: &str) -> ExpressionResult<Query> {
        let parsed = Self::parse_select(text.trim())?;
        let select = parsed.select;
        let criteria = Criteria::new(schema);

        if select.from.len() != 1 {
            return Err(ExpressionError::UnsupportedSyntax(
                "exactly one entity in FROM required".into(),
            ));
        }
        let entity = Self::extract_from_table(&select.from[0])?;
        if entity != schema.name {
            return Err(ExpressionError::UnknownEntity(entity));
        }

        let mut query = criteria.query();

        let columns = Self::convert_projection(&select.projection)?;
        if let Some(columns) = columns {
            query = query.with_projection(criteria.projection(columns)?);
        }

        if let Some(selection) = &select.selection {
            query = query.with_filter(Self::convert_expr(&criteria, selection)?);
        }

        if let Some(order_by) = &parsed.query.order_by {
            if let sp::OrderByKind::Expressions(exprs) = &order_by.kind {
                for expr in exprs {
                    let path = Self::ident_path(&expr.expr).ok_or_else(|| {
                        ExpressionError::UnsupportedSyntax(format!("ORDER BY {}", expr.expr))
                    })?;
                    let direction = match expr.options.asc {
                        Some(false) => SortDirection::Descending,
                        _ => SortDirection::Ascending,
                    };
                    query = query.with_sort(criteria.sort(&path, direction)?);
                }
            }
        }

        if let Some(limit) = parsed.query.limit.as_ref() {
            let limit = Self::expr_to_usize(limit)
                .ok_or_else(|| ExpressionError::InvalidLiteral(format!("LIMIT {}", limit)))?;
            query = query.with_limit(limit);
        }
        if let Some(offset) = parsed.query.offset.as_ref() {
            let value = Self::expr_to_usize(&offset.value).ok_or_else(|| {
                ExpressionError::InvalidLiteral(format!("OFFSET {}", offset.value))
            })?;
            query = query.with_offset(value);
        }

        Ok(query)
    }

    fn parse_select(sql: &str) -> ExpressionResult<ParsedSelect> {
        let dialect = GenericDialect {};
        let mut statements = SqlParser::parse_sql(&dialect, sql)?;
        if statements.len() != 1 {
            return Err(ExpressionError::UnsupportedSyntax(
                "exactly one statement required".into(),
            ));
        }
        let query = match statements.remove(0) {
            sp::Statement::Query(query) => query,
            other => {
                return Err(ExpressionError::UnsupportedSyntax(format!(
                    "expected SELECT, got {}",
                    other
                )))
            }
        };
        let select = match query.body.as_ref() {
            sp::SetExpr::Select(select) => select.as_ref().clone(),
            other => {
                return Err(ExpressionError::UnsupportedSyntax(format!(
                    "unsupported query body: {}",
                    other
                )))
            }
        };
        Ok(ParsedSelect { query, select })
    }

    fn extract_from_table(from: &sp::TableWithJoins) -> ExpressionResult<String> {
        if !from.joins.is_empty() {
            return Err(ExpressionError::UnsupportedSyntax("joins".into()));
        }
        match &from.relation {
            sp::TableFactor::Table { name, .. } => name
                .0
                .last()
                .map(|i| i.as_ident().map(|id| id.value.clone()).unwrap_or_else(|| i.to_string()))
                .ok_or_else(|| ExpressionError::UnsupportedSyntax("empty entity name".into())),
            other => Err(ExpressionError::UnsupportedSyntax(format!("FROM {}", other))),
        }
    }

    /// `None` for `SELECT *`.
    fn convert_projection(items: &[sp::SelectItem]) -> ExpressionResult<Option<Vec<String>>> {
        if let [sp::SelectItem::Wildcard(_)] = items {
            return Ok(None);
        }
        items
            .iter()
            .map(|item| match item {
                sp::SelectItem::UnnamedExpr(expr) => Self::ident_path(expr).ok_or_else(|| {
                    ExpressionError::UnsupportedSyntax(format!("projected expression {}", expr))
                }),
                other => Err(ExpressionError::UnsupportedSyntax(format!(
                    "projection item {}",
                    other
                ))),
            })
            .collect::<ExpressionResult<Vec<_>>>()
            .map(Some)
    }

    fn convert_expr(criteria: &Criteria<'_>, expr: &sp::Expr) -> ExpressionResult<Expression> {
        match expr {
            sp::Expr::Identifier(_) | sp::Expr::CompoundIdentifier(_) => {
                let path = Self::require_path(expr)?;
                criteria.field(&path)?.is_true()
            }

            sp::Expr::Value(v) => match &v.value {
                sp::Value::Boolean(b) => Ok(Expression::constant(*b)),
                other => Err(ExpressionError::InvalidLiteral(format!(
                    "{} is not a predicate",
                    other
                ))),
            },

            sp::Expr::Nested(inner) => Self::convert_expr(criteria, inner),

            sp::Expr::UnaryOp { op: sp::UnaryOperator::Not, expr } => {
                Ok(Expression::not(Self::convert_expr(criteria, expr)?))
            }

            sp::Expr::BinaryOp { left, op: sp::BinaryOperator::And, right } => {
                Self::combine(criteria, LogicalOp::And, left, right)
            }

            sp::Expr::BinaryOp { left, op: sp::BinaryOperator::Or, right } => {
                Self::combine(criteria, LogicalOp::Or, left, right)
            }

            sp::Expr::BinaryOp { left, op, right } => {
                let op = Self::convert_comparison_op(op)?;
                Self::convert_comparison(criteria, op, left, right)
            }

            sp::Expr::IsNull(e) => Self::field(criteria, e)?.is_absent(),

            sp::Expr::IsNotNull(e) => Self::field(criteria, e)?.is_present(),

            sp::Expr::InList { expr, list, negated } => {
                let field = Self::field(criteria, expr)?;
                let values = list
                    .iter()
                    .map(|item| Self::literal(item, field.field_type()))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                if *negated {
                    field.not_in(values)
                } else {
                    field.is_in(values)
                }
            }

            sp::Expr::Between { expr, low, high, negated } => {
                let field = Self::field(criteria, expr)?;
                let range = Expression::and([
                    field.gte(Self::literal(low, field.field_type())?)?,
                    field.lte(Self::literal(high, field.field_type())?)?,
                ]);
                Ok(if *negated { Expression::not(range) } else { range })
            }

            sp::Expr::AnyOp { left, compare_op, right, .. } => {
                let op = Self::convert_comparison_op(compare_op)?;
                let list = Self::field(criteria, Self::unnest(right))?;
                let element_type = list.field_type();
                let value = Self::literal(left, element_type)?;
                list.any(|e| e.element()?.compare(op.flip(), value))
            }

            sp::Expr::AllOp { left, compare_op, right, .. } => {
                let op = Self::convert_comparison_op(compare_op)?;
                let list = Self::field(criteria, Self::unnest(right))?;
                let element_type = list.field_type();
                let value = Self::literal(left, element_type)?;
                list.all(|e| e.element()?.compare(op.flip(), value))
            }

            other => Err(ExpressionError::UnsupportedSyntax(other.to_string())),
        }
    }

    /// Flatten chains of the same combinator into one node.
    fn combine(
        criteria: &Criteria<'_>,
        op: LogicalOp,
        left: &sp::Expr,
        right: &sp::Expr,
    ) -> ExpressionResult<Expression> {
        let mut operands = Vec::new();
        for side in [left, right] {
            match Self::convert_expr(criteria, side)? {
                Expression::Logical { op: inner, operands: nested } if inner == op => {
                    operands.extend(nested)
                }
                other => operands.push(other),
            }
        }
        Ok(Expression::Logical { op, operands })
    }

    fn convert_comparison(
        criteria: &Criteria<'_>,
        op: ComparisonOp,
        left: &sp::Expr,
        right: &sp::Expr,
    ) -> ExpressionResult<Expression> {
        if let Some(list) = Self::cardinality_arg(left) {
            let size = Self::expr_to_usize(right)
                .ok_or_else(|| ExpressionError::InvalidLiteral(right.to_string()))?;
            return criteria.field(&list)?.size(op, size);
        }
        if let Some(list) = Self::cardinality_arg(right) {
            let size = Self::expr_to_usize(left)
                .ok_or_else(|| ExpressionError::InvalidLiteral(left.to_string()))?;
            return criteria.field(&list)?.size(op.flip(), size);
        }

        // Literal on the left: `18 <= age`.
        let (op, path_expr, value_expr) = match Self::ident_path(left) {
            Some(_) => (op, left, right),
            None => (op.flip(), right, left),
        };
        let field = Self::field(criteria, path_expr)?;
        let value = Self::literal(value_expr, field.field_type())?;
        field.compare(op, value)
    }

    fn convert_comparison_op(op: &sp::BinaryOperator) -> ExpressionResult<ComparisonOp> {
        match op {
            sp::BinaryOperator::Eq => Ok(ComparisonOp::Eq),
            sp::BinaryOperator::NotEq => Ok(ComparisonOp::Ne),
            sp::BinaryOperator::Lt => Ok(ComparisonOp::Lt),
            sp::BinaryOperator::LtEq => Ok(ComparisonOp::Lte),
            sp::BinaryOperator::Gt => Ok(ComparisonOp::Gt),
            sp::BinaryOperator::GtEq => Ok(ComparisonOp::Gte),
            other => Err(ExpressionError::UnsupportedSyntax(format!("operator {}", other))),
        }
    }

    fn field<'a>(criteria: &Criteria<'a>, expr: &sp::Expr) -> ExpressionResult<FieldRef<'a>> {
        criteria.field(&Self::require_path(expr)?)
    }

    fn require_path(expr: &sp::Expr) -> ExpressionResult<String> {
        Self::ident_path(expr)
            .ok_or_else(|| ExpressionError::UnsupportedSyntax(format!("expected a field, got {}", expr)))
    }

    fn ident_path(expr: &sp::Expr) -> Option<String> {
        match expr {
            sp::Expr::Identifier(id) => Some(id.value.clone()),
            sp::Expr::CompoundIdentifier(parts) => Some(
                parts
                    .iter()
                    .map(|p| p.value.clone())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            _ => None,
        }
    }

    fn unnest(expr: &sp::Expr) -> &sp::Expr {
        match expr {
            sp::Expr::Nested(inner) => Self::unnest(inner),
            other => other,
        }
    }

    /// Field named by `CARDINALITY(field)`.
    fn cardinality_arg(expr: &sp::Expr) -> Option<String> {
        let sp::Expr::Function(f) = expr else {
            return None;
        };
        if !f.name.to_string().eq_ignore_ascii_case("cardinality") {
            return None;
        }
        match &f.args {
            sp::FunctionArguments::List(list) => match list.args.as_slice() {
                [sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e))] => Self::ident_path(e),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert a literal, reading strings as dates or timestamps when the
    /// target field needs one.
    fn literal(expr: &sp::Expr, target: &FieldType) -> ExpressionResult<Value> {
        let value = match expr {
            sp::Expr::Value(v) => Self::convert_value(&v.value)?,
            sp::Expr::UnaryOp { op: sp::UnaryOperator::Minus, expr } => {
                match Self::literal(expr, target)? {
                    Value::Integer(n) => Value::Integer(-n),
                    Value::Float(f) => Value::Float(-f),
                    other => {
                        return Err(ExpressionError::InvalidLiteral(format!("-{}", other)))
                    }
                }
            }
            sp::Expr::Nested(inner) => Self::literal(inner, target)?,
            other => return Err(ExpressionError::InvalidLiteral(other.to_string())),
        };
        match (target, value) {
            (FieldType::Date, Value::Text(s)) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| ExpressionError::InvalidLiteral(format!("date '{}': {}", s, e))),
            (FieldType::Timestamp, Value::Text(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| ExpressionError::InvalidLiteral(format!("timestamp '{}': {}", s, e))),
            (_, value) => Ok(value),
        }
    }

    fn convert_value(v: &sp::Value) -> ExpressionResult<Value> {
        match v {
            sp::Value::Null => Ok(Value::Null),
            sp::Value::Boolean(b) => Ok(Value::Boolean(*b)),
            sp::Value::Number(s, _) => {
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::Integer(i))
                } else if let Ok(f) = s.parse::<f64>() {
                    Ok(Value::Float(f))
                } else {
                    Err(ExpressionError::InvalidLiteral(format!("invalid number: {}", s)))
                }
            }
            sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            other => Err(ExpressionError::InvalidLiteral(other.to_string())),
        }
    }

    fn expr_to_usize(expr: &sp::Expr) -> Option<usize> {
        match expr {
            sp::Expr::Value(v) => match &v.value {
                sp::Value::Number(s, _) => s.parse().ok(),
                _ => None,
            },
            _ => None,
        }
    }
}

struct ParsedSelect {
    query: Box<sp::Query>,
    select: sp::Select,
}

impl ParsedSelect {
    fn body_selection(&self) -> Option<&sp::Expr> {
        self.select.selection.as_ref()
    }
}
