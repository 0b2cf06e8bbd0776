use crate::errors::StoreError;
use crate::kv::script::{ScriptKind, ScriptRegistry};
use crate::kv::{KvStore, ScriptArg};

/// An inclusive score interval, optionally capped to the first `limit`
/// members by ascending score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    pub limit: Option<u64>,
}

impl ScoreRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max, limit: None }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What to do with the members selected by a [`ScoreRange`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreRangeOp {
    SetScore(f64),
    Increment(f64),
    Delete,
}

impl ScoreRangeOp {
    const fn kind(self) -> ScriptKind {
        match self {
            Self::SetScore(_) => ScriptKind::ZsetSetByScore,
            Self::Increment(_) => ScriptKind::ZsetIncrByScore,
            Self::Delete => ScriptKind::ZsetDelByScore,
        }
    }
}

/// Fetches the members of `key` scored within `range` and applies `op` to
/// them, as one atomic server-side call.
///
/// Returns the affected members in ascending order of their scores *before*
/// the mutation. Without the server-side atomicity a concurrent writer
/// could rescore a member between the range scan and the per-member
/// mutation; a failure therefore means the whole call did not happen.
pub async fn mutate_score_range<K: KvStore>(
    store: &K,
    registry: &ScriptRegistry,
    key: &str,
    range: ScoreRange,
    op: ScoreRangeOp,
) -> Result<Vec<String>, StoreError> {
    let script = registry.get(op.kind())?;
    let mut args = vec![ScriptArg::Float(range.min), ScriptArg::Float(range.max)];
    match op {
        ScoreRangeOp::SetScore(v) | ScoreRangeOp::Increment(v) => args.push(ScriptArg::Float(v)),
        ScoreRangeOp::Delete => {}
    }
    args.push(range.limit.map_or(ScriptArg::Nil, |n| ScriptArg::Int(n as i64)));
    let keys = [key.to_string()];
    store.run_script(script, &keys, &args).await
}
