//! Expression AST for predicates over entity fields.
//!
//! Nodes are plain immutable values. Construction never fails here; type
//! checking against a schema happens in [`super::Criteria`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Dotted reference to a field (`address.city`).
///
/// The empty path refers to the current element inside a collection
/// predicate over a list of scalars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Path(Vec<String>);

impl Path {
    /// Parse a dotted path.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// The current collection element.
    pub fn element() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_element(&self) -> bool {
        self.0.is_empty()
    }

    /// Append `child` to this path.
    pub fn join(&self, child: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(child.0.iter().cloned());
        Path(segments)
    }

    /// Dotted representation.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// Value at this path inside a JSON document. The element path
    /// returns the document itself.
    pub fn lookup<'a>(&self, doc: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.0
            .iter()
            .try_fold(doc, |current, segment| current.get(segment.as_str()))
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::parse(&s)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl From<Path> for String {
    fn from(p: Path) -> Self {
        p.dotted()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_element() {
            write!(f, "$")
        } else {
            write!(f, "{}", self.dotted())
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
        }
    }

    /// Check if this is an ordering (range) operator.
    pub fn is_range(&self) -> bool {
        !matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }

    /// Operator with swapped operands (`a < b` ⇔ `b > a`).
    pub fn flip(&self) -> ComparisonOp {
        match self {
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Gte => ComparisonOp::Lte,
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Lte => ComparisonOp::Gte,
            other => *other,
        }
    }

    /// Apply the operator to the result of `left.cmp(right)`.
    pub fn test(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::Ne => ordering != Ordering::Equal,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::Gte => ordering != Ordering::Less,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::Lte => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
            LogicalOp::Not => write!(f, "NOT"),
        }
    }
}

/// Predicate over a multi-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantifier {
    /// At least one element satisfies the predicate.
    Any(Box<Expression>),
    /// Every element satisfies the predicate (vacuously true when empty).
    All(Box<Expression>),
    /// The number of elements compares to `size`.
    Size { op: ComparisonOp, size: usize },
}

impl Quantifier {
    pub fn name(&self) -> &'static str {
        match self {
            Quantifier::Any(_) => "any",
            Quantifier::All(_) => "all",
            Quantifier::Size { .. } => "size",
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Field reference; as a predicate, a boolean field being `true`.
    Path(Path),
    /// Constant; as a predicate, `true` matches everything.
    Literal(Value),
    /// `path op value`. A `Null` value with `Eq`/`Ne` tests absence.
    Comparison {
        op: ComparisonOp,
        path: Path,
        value: Value,
    },
    /// `path [NOT] IN (values)`.
    Membership {
        path: Path,
        values: Vec<Value>,
        negated: bool,
    },
    /// `AND`/`OR` over any number of operands, `NOT` over exactly one.
    Logical {
        op: LogicalOp,
        operands: Vec<Expression>,
    },
    /// Quantified predicate over a list field. Element predicates use
    /// paths relative to the element.
    Collection { path: Path, quantifier: Quantifier },
}

impl Expression {
    /// Conjunction of `operands`.
    pub fn and(operands: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Logical {
            op: LogicalOp::And,
            operands: operands.into_iter().collect(),
        }
    }

    /// Disjunction of `operands`.
    pub fn or(operands: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Logical {
            op: LogicalOp::Or,
            operands: operands.into_iter().collect(),
        }
    }

    /// Negation of `operand`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expression) -> Self {
        Expression::Logical {
            op: LogicalOp::Not,
            operands: vec![operand],
        }
    }

    /// Constant predicate.
    pub fn constant(value: bool) -> Self {
        Expression::Literal(Value::Boolean(value))
    }

    /// Number of nodes in this tree.
    pub fn node_count(&self) -> usize {
        match self {
            Expression::Path(_) | Expression::Literal(_) => 1,
            Expression::Comparison { .. } | Expression::Membership { .. } => 1,
            Expression::Logical { operands, .. } => {
                1 + operands.iter().map(Expression::node_count).sum::<usize>()
            }
            Expression::Collection { quantifier, .. } => match quantifier {
                Quantifier::Any(inner) | Quantifier::All(inner) => 1 + inner.node_count(),
                Quantifier::Size { .. } => 1,
            },
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Path(path) => write!(f, "{}", path),
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Comparison { op, path, value } if value.is_null() => match op {
                ComparisonOp::Eq => write!(f, "{} IS NULL", path),
                _ => write!(f, "{} IS NOT NULL", path),
            },
            Expression::Comparison { op, path, value } => write!(f, "{} {} {}", path, op, value),
            Expression::Membership { path, values, negated } => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}IN ({})", path, not, items.join(", "))
            }
            Expression::Logical { op: LogicalOp::Not, operands } => {
                let inner: Vec<String> = operands.iter().map(|e| e.to_string()).collect();
                write!(f, "NOT ({})", inner.join(", "))
            }
            Expression::Logical { op, operands } => {
                let parts: Vec<String> = operands.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(&format!(" {} ", op)))
            }
            Expression::Collection { path, quantifier } => match quantifier {
                Quantifier::Any(inner) => write!(f, "ANY {} ({})", path, inner),
                Quantifier::All(inner) => write!(f, "ALL {} ({})", path, inner),
                Quantifier::Size { op, size } => write!(f, "SIZE({}) {} {}", path, op, size),
            },
        }
    }
}
