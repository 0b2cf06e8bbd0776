use bson::Bson;
use serde::Deserialize;

use super::types::{CmpOp, Filter};
use crate::errors::StoreError;

// Serde-facing structure for safe JSON parsing of filters.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FilterSerde {
    And {
        #[serde(rename = "$and")]
        and: Vec<FilterSerde>,
    },
    Or {
        #[serde(rename = "$or")]
        or: Vec<FilterSerde>,
    },
    Not {
        #[serde(rename = "$not")]
        not: Box<FilterSerde>,
    },
    Exists {
        field: String,
        #[serde(rename = "$exists")]
        exists: bool,
    },
    In {
        field: String,
        #[serde(rename = "$in")]
        in_vals: Vec<Bson>,
    },
    Nin {
        field: String,
        #[serde(rename = "$nin")]
        nin_vals: Vec<Bson>,
    },
    Cmp {
        field: String,
        #[serde(rename = "$eq")]
        eq: Box<Option<Bson>>,
        #[serde(rename = "$gt")]
        gt: Box<Option<Bson>>,
        #[serde(rename = "$gte")]
        gte: Box<Option<Bson>>,
        #[serde(rename = "$lt")]
        lt: Box<Option<Bson>>,
        #[serde(rename = "$lte")]
        lte: Box<Option<Bson>>,
    },
    True(bool),
}

impl TryFrom<FilterSerde> for Filter {
    type Error = StoreError;
    fn try_from(fs: FilterSerde) -> Result<Self, Self::Error> {
        use FilterSerde as FS;
        Ok(match fs {
            FS::And { and } => {
                Self::And(and.into_iter().map(Self::try_from).collect::<Result<_, _>>()?)
            }
            FS::Or { or } => {
                Self::Or(or.into_iter().map(Self::try_from).collect::<Result<_, _>>()?)
            }
            FS::Not { not } => Self::Not(Box::new(Self::try_from(*not)?)),
            FS::Exists { field, exists } => Self::Exists { path: field, exists },
            FS::In { field, in_vals } => Self::In { path: field, values: in_vals },
            FS::Nin { field, nin_vals } => Self::Nin { path: field, values: nin_vals },
            FS::Cmp { field, eq, gt, gte, lt, lte } => {
                let (op, value) = if let Some(v) = *eq {
                    (CmpOp::Eq, v)
                } else if let Some(v) = *gt {
                    (CmpOp::Gt, v)
                } else if let Some(v) = *gte {
                    (CmpOp::Gte, v)
                } else if let Some(v) = *lt {
                    (CmpOp::Lt, v)
                } else if let Some(v) = *lte {
                    (CmpOp::Lte, v)
                } else {
                    return Err(StoreError::BadFilter(format!(
                        "no comparison operator for field `{field}`"
                    )));
                };
                Self::Cmp { path: field, op, value }
            }
            FS::True(true) => Self::True,
            FS::True(false) => {
                return Err(StoreError::BadFilter("literal false filter".into()));
            }
        })
    }
}

/// Parses a JSON predicate into a [`Filter`].
///
/// A malformed document is a non-transient error; the retry policy will not
/// re-attempt it.
pub fn parse_filter_json(s: &str) -> Result<Filter, StoreError> {
    let fs: FilterSerde = serde_json::from_str(s)?;
    Filter::try_from(fs)
}
