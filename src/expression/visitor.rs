//! Visitor dispatch over expression trees.
//!
//! Each backend compiler implements [`ExpressionVisitor`]; adding a new
//! backend never touches the expression types. Visitors recurse by calling
//! [`Expression::accept`] on child nodes themselves.

use super::ast::{ComparisonOp, Expression, LogicalOp, Path, Quantifier};
use super::value::Value;

/// One method per expression variant.
pub trait ExpressionVisitor {
    type Output;

    fn visit_path(&mut self, path: &Path) -> Self::Output;

    fn visit_literal(&mut self, value: &Value) -> Self::Output;

    fn visit_comparison(&mut self, op: ComparisonOp, path: &Path, value: &Value) -> Self::Output;

    fn visit_membership(&mut self, path: &Path, values: &[Value], negated: bool) -> Self::Output;

    fn visit_logical(&mut self, op: LogicalOp, operands: &[Expression]) -> Self::Output;

    fn visit_collection(&mut self, path: &Path, quantifier: &Quantifier) -> Self::Output;
}

impl Expression {
    /// Dispatch to the visitor method for this node.
    pub fn accept<V: ExpressionVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expression::Path(path) => visitor.visit_path(path),
            Expression::Literal(value) => visitor.visit_literal(value),
            Expression::Comparison { op, path, value } => visitor.visit_comparison(*op, path, value),
            Expression::Membership { path, values, negated } => {
                visitor.visit_membership(path, values, *negated)
            }
            Expression::Logical { op, operands } => visitor.visit_logical(*op, operands),
            Expression::Collection { path, quantifier } => visitor.visit_collection(path, quantifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects every field path an expression touches.
    struct PathCollector {
        prefix: Path,
        paths: Vec<String>,
    }

    impl ExpressionVisitor for PathCollector {
        type Output = ();

        fn visit_path(&mut self, path: &Path) {
            self.paths.push(self.prefix.join(path).dotted());
        }

        fn visit_literal(&mut self, _value: &Value) {}

        fn visit_comparison(&mut self, _op: ComparisonOp, path: &Path, _value: &Value) {
            self.paths.push(self.prefix.join(path).dotted());
        }

        fn visit_membership(&mut self, path: &Path, _values: &[Value], _negated: bool) {
            self.paths.push(self.prefix.join(path).dotted());
        }

        fn visit_logical(&mut self, _op: LogicalOp, operands: &[Expression]) {
            for operand in operands {
                operand.accept(self);
            }
        }

        fn visit_collection(&mut self, path: &Path, quantifier: &Quantifier) {
            match quantifier {
                Quantifier::Any(inner) | Quantifier::All(inner) => {
                    let joined = self.prefix.join(path);
                    let saved = std::mem::replace(&mut self.prefix, joined);
                    inner.accept(self);
                    self.prefix = saved;
                }
                Quantifier::Size { .. } => self.paths.push(self.prefix.join(path).dotted()),
            }
        }
    }

    #[test]
    fn test_custom_visitor_walks_tree() {
        let expr = Expression::and([
            Expression::Path(Path::parse("active")),
            Expression::Collection {
                path: Path::parse("pets"),
                quantifier: Quantifier::Any(Box::new(Expression::Comparison {
                    op: ComparisonOp::Eq,
                    path: Path::parse("kind"),
                    value: "cat".into(),
                })),
            },
            Expression::not(Expression::Membership {
                path: Path::parse("name"),
                values: vec!["x".into()],
                negated: true,
            }),
        ]);

        let mut collector = PathCollector { prefix: Path::element(), paths: Vec::new() };
        expr.accept(&mut collector);
        assert_eq!(collector.paths, vec!["active", "pets.kind", "name"]);
    }
}
