//! Query values: filter, sort, projection and paging.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ast::{Expression, Path};
use crate::catalog::{Cardinality, FieldType};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub path: Path,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(path: impl Into<Path>, direction: SortDirection) -> Self {
        Self { path: path.into(), direction }
    }
}

/// One projected column and the type it is extracted as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectedField {
    pub path: Path,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Ordered list of projected columns. Its length is the tuple arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projection {
    pub fields: Vec<ProjectedField>,
}

impl Projection {
    pub fn new(fields: Vec<ProjectedField>) -> Self {
        Self { fields }
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Projected paths in declared order.
    pub fn paths(&self) -> Vec<&Path> {
        self.fields.iter().map(|f| &f.path).collect()
    }
}

/// An immutable query against one entity.
///
/// Equality and hashing are structural, so a `Query` can key a compiled
/// query cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Entity (collection / index / table) name.
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Request relevance ranking instead of a pure filter.
    #[serde(default)]
    pub ranking: bool,
}

impl Query {
    /// Query matching every document of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filter: None,
            sort: Vec::new(),
            projection: None,
            limit: None,
            offset: None,
            ranking: false,
        }
    }

    /// Replace the filter.
    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a sort key.
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Replace the projection.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_ranking(mut self, ranking: bool) -> Self {
        self.ranking = ranking;
        self
    }

    /// Tuple arity produced by this query (1 without a projection: the
    /// whole document).
    pub fn arity(&self) -> usize {
        self.projection.as_ref().map(Projection::arity).unwrap_or(1)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.projection {
            Some(p) => {
                let cols: Vec<String> = p.fields.iter().map(|c| c.path.to_string()).collect();
                write!(f, "SELECT {} FROM {}", cols.join(", "), self.entity)?;
            }
            None => write!(f, "SELECT * FROM {}", self.entity)?,
        }
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        if !self.sort.is_empty() {
            let keys: Vec<String> = self
                .sort
                .iter()
                .map(|s| format!("{} {}", s.path, s.direction.as_str().to_uppercase()))
                .collect();
            write!(f, " ORDER BY {}", keys.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ComparisonOp, Value};
    use std::collections::HashMap;

    fn adults() -> Query {
        Query::new("people")
            .with_filter(Expression::Comparison {
                op: ComparisonOp::Gte,
                path: Path::parse("age"),
                value: Value::Integer(18),
            })
            .with_sort(Sort::new("name", SortDirection::Ascending))
            .with_limit(10)
    }

    #[test]
    fn test_display() {
        assert_eq!(
            adults().to_string(),
            "SELECT * FROM people WHERE age >= 18 ORDER BY name ASC LIMIT 10"
        );
    }

    #[test]
    fn test_query_is_a_structural_key() {
        let mut cache = HashMap::new();
        cache.insert(adults(), 1);
        assert_eq!(cache.get(&adults()), Some(&1));
        assert_eq!(cache.get(&adults().with_offset(5)), None);
    }

    #[test]
    fn test_arity() {
        assert_eq!(Query::new("t").arity(), 1);
        let projection = Projection::new(vec![
            ProjectedField {
                path: Path::parse("a"),
                field_type: FieldType::Text,
                cardinality: Cardinality::Required,
            },
            ProjectedField {
                path: Path::parse("b"),
                field_type: FieldType::Integer,
                cardinality: Cardinality::Required,
            },
        ]);
        assert_eq!(Query::new("t").with_projection(projection).arity(), 2);
    }

    #[test]
    fn test_serde_roundtrip() {
        let query = adults().with_ranking(true);
        let json = serde_json::to_string(&query).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }
}
