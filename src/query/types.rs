use crate::document::ID_FIELD;
use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    /// Ascending sort over the identity field, the ordering every
    /// keyset traversal runs under.
    #[must_use]
    pub fn id_asc() -> Self {
        Self { field: ID_FIELD.to_string(), order: Order::Asc }
    }
}

/// Options for a single bounded fetch against the store.
///
/// Each fetch is self-contained: the store evaluates the filter, sorts,
/// applies `skip`/`limit` and returns a materialized batch, so no server
/// cursor survives the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A boolean predicate the store evaluates server-side.
///
/// This layer never inspects a filter's structure beyond [`Filter::is_empty`]
/// and the lower-bound conjunction in [`Filter::with_id_above`].
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Default for Filter {
    fn default() -> Self {
        Self::True
    }
}

impl Filter {
    /// An empty filter matches everything; the count estimator answers it
    /// with the fast approximate count instead of an exact scan.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Equality on a single field.
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    /// Conjoins `self` with `identity > bound`, the keyset resume predicate.
    #[must_use]
    pub fn with_id_above(&self, bound: &Bson) -> Self {
        let gt = Self::Cmp { path: ID_FIELD.to_string(), op: CmpOp::Gt, value: bound.clone() };
        match self {
            Self::True => gt,
            Self::And(fs) => {
                let mut fs = fs.clone();
                fs.push(gt);
                Self::And(fs)
            }
            other => Self::And(vec![other.clone(), gt]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_bound_conjunction() {
        let base = Filter::eq("kind", "a");
        let bounded = base.with_id_above(&Bson::Int32(10));
        match bounded {
            Filter::And(fs) => assert_eq!(fs.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
        // an empty filter collapses to the bare bound
        assert!(matches!(Filter::True.with_id_above(&Bson::Int32(0)), Filter::Cmp { .. }));
    }
}
