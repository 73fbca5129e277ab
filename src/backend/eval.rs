//! Evaluation of in-memory plans against JSON documents.

use std::cmp::Ordering;

use serde_json::Value as Json;

use crate::catalog::{Cardinality, FieldType};
use crate::compiler::{Predicate, SortKey};
use crate::expression::{ComparisonOp, Path, SortDirection, Value};

/// Check if `doc` satisfies `predicate`.
pub fn matches(predicate: &Predicate, doc: &Json) -> bool {
    match predicate {
        Predicate::Constant { value } => *value,
        Predicate::IsTrue { path } => matches!(present(path, doc), Some(Json::Bool(true))),
        Predicate::Compare { path, cmp, value, field_type } => {
            let Some(actual) = present(path, doc).and_then(|raw| typed(raw, field_type)) else {
                // Missing, null or of another kind: only `<>` holds.
                return *cmp == ComparisonOp::Ne;
            };
            match actual.compare(value) {
                Some(ordering) => cmp.test(ordering),
                None => *cmp == ComparisonOp::Ne,
            }
        }
        Predicate::Absent { path } => present(path, doc).is_none(),
        Predicate::Present { path } => present(path, doc).is_some(),
        Predicate::In { path, values, negated, field_type } => {
            let found = present(path, doc)
                .and_then(|raw| typed(raw, field_type))
                .is_some_and(|actual| values.iter().any(|v| actual.matches(v)));
            found != *negated
        }
        Predicate::And { operands } => operands.iter().all(|p| matches(p, doc)),
        Predicate::Or { operands } => operands.iter().any(|p| matches(p, doc)),
        Predicate::Not { operand } => !matches(operand, doc),
        Predicate::Any { path, predicate } => {
            elements(path, doc).is_some_and(|items| items.iter().any(|item| matches(predicate, item)))
        }
        Predicate::All { path, predicate } => {
            elements(path, doc).map_or(true, |items| items.iter().all(|item| matches(predicate, item)))
        }
        Predicate::Size { path, cmp, size } => {
            let len = elements(path, doc).map_or(0, Vec::len);
            cmp.test(len.cmp(size))
        }
    }
}

/// Order two documents by `keys`. Missing and null values sort first.
pub fn compare_documents(keys: &[SortKey], a: &Json, b: &Json) -> Ordering {
    for key in keys {
        let ordering = compare_values(
            present(&key.path, a),
            present(&key.path, b),
            &key.field_type,
        );
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Json>, b: Option<&Json>, field_type: &FieldType) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (typed(a, field_type), typed(b, field_type)) {
            (Some(a), Some(b)) => a.compare(&b).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Value at `path`, treating null as absent.
fn present<'a>(path: &Path, doc: &'a Json) -> Option<&'a Json> {
    path.lookup(doc).filter(|v| !v.is_null())
}

fn elements<'a>(path: &Path, doc: &'a Json) -> Option<&'a Vec<Json>> {
    present(path, doc).and_then(Json::as_array)
}

fn typed(raw: &Json, field_type: &FieldType) -> Option<Value> {
    Value::from_json(raw, field_type, Cardinality::Required).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compare(path: &str, cmp: ComparisonOp, value: Value, field_type: FieldType) -> Predicate {
        Predicate::Compare {
            path: Path::parse(path),
            cmp,
            value,
            field_type,
        }
    }

    #[test]
    fn test_absent_field_semantics() {
        let doc = json!({ "name": "Ann", "nickname": null });
        let eq = compare("nickname", ComparisonOp::Eq, "A".into(), FieldType::Text);
        let ne = compare("nickname", ComparisonOp::Ne, "A".into(), FieldType::Text);
        let gt = compare("age", ComparisonOp::Gt, Value::Integer(1), FieldType::Integer);
        assert!(!matches(&eq, &doc));
        assert!(matches(&ne, &doc));
        assert!(!matches(&gt, &doc));
        assert!(matches(&Predicate::Absent { path: Path::parse("nickname") }, &doc));
        assert!(matches(&Predicate::Present { path: Path::parse("name") }, &doc));
    }

    #[test]
    fn test_numeric_widening() {
        let doc = json!({ "score": 3 });
        let gte = compare("score", ComparisonOp::Gte, Value::Float(2.5), FieldType::Float);
        assert!(matches(&gte, &doc));
    }

    #[test]
    fn test_quantifiers() {
        let kind_is_cat = compare("kind", ComparisonOp::Eq, "cat".into(), FieldType::Text);
        let any = Predicate::Any {
            path: Path::parse("pets"),
            predicate: Box::new(kind_is_cat.clone()),
        };
        let all = Predicate::All {
            path: Path::parse("pets"),
            predicate: Box::new(kind_is_cat),
        };

        let mixed = json!({ "pets": [{ "kind": "cat" }, { "kind": "dog" }] });
        let cats = json!({ "pets": [{ "kind": "cat" }] });
        let none = json!({ "pets": [] });
        let missing = json!({});

        assert!(matches(&any, &mixed) && !matches(&all, &mixed));
        assert!(matches(&any, &cats) && matches(&all, &cats));
        assert!(!matches(&any, &none) && matches(&all, &none));
        assert!(!matches(&any, &missing) && matches(&all, &missing));
    }

    #[test]
    fn test_scalar_elements_and_size() {
        let doc = json!({ "tags": ["a", "b"] });
        let has_b = Predicate::Any {
            path: Path::parse("tags"),
            predicate: Box::new(compare("", ComparisonOp::Eq, "b".into(), FieldType::Text)),
        };
        assert!(matches(&has_b, &doc));

        let size = |cmp, size| Predicate::Size { path: Path::parse("tags"), cmp, size };
        assert!(matches(&size(ComparisonOp::Eq, 2), &doc));
        assert!(!matches(&size(ComparisonOp::Gt, 2), &doc));
        assert!(matches(&size(ComparisonOp::Eq, 0), &json!({})));
    }

    #[test]
    fn test_membership_and_negation() {
        let doc = json!({ "color": "RED" });
        let colors = FieldType::Enum(vec!["RED".into(), "BLUE".into()]);
        let is_in = Predicate::In {
            path: Path::parse("color"),
            values: vec!["RED".into()],
            negated: false,
            field_type: colors.clone(),
        };
        let not_in = Predicate::In {
            path: Path::parse("color"),
            values: vec!["BLUE".into()],
            negated: true,
            field_type: colors,
        };
        assert!(matches(&is_in, &doc));
        assert!(matches(&not_in, &doc));
        let twice = Predicate::Not {
            operand: Box::new(Predicate::Not { operand: Box::new(is_in.clone()) }),
        };
        assert_eq!(matches(&twice, &doc), matches(&is_in, &doc));
    }

    #[test]
    fn test_compare_documents_nulls_first() {
        let keys = vec![SortKey {
            path: Path::parse("age"),
            direction: SortDirection::Ascending,
            field_type: FieldType::Integer,
        }];
        let mut docs = vec![json!({ "age": 30 }), json!({}), json!({ "age": 4 })];
        docs.sort_by(|a, b| compare_documents(&keys, a, b));
        assert_eq!(docs, vec![json!({}), json!({ "age": 4 }), json!({ "age": 30 })]);

        let desc = vec![SortKey { direction: SortDirection::Descending, ..keys[0].clone() }];
        docs.sort_by(|a, b| compare_documents(&desc, a, b));
        assert_eq!(docs[0], json!({ "age": 30 }));
    }
}
