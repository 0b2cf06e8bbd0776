use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::errors::StoreError;

/// The atomic operations this layer requires of a key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    ZsetSetByScore,
    ZsetIncrByScore,
    ZsetDelByScore,
}

impl ScriptKind {
    pub const ALL: [Self; 3] = [Self::ZsetSetByScore, Self::ZsetIncrByScore, Self::ZsetDelByScore];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ZsetSetByScore => "zset_set_by_score",
            Self::ZsetIncrByScore => "zset_incr_by_score",
            Self::ZsetDelByScore => "zset_del_by_score",
        }
    }
}

/// A named atomic operation and its server-side definition.
///
/// The source is what a script-capable store (e.g. a Redis adapter) would
/// register verbatim; embedded stores are free to execute the operation
/// natively, keyed by name, as long as the call stays indivisible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptDef {
    pub name: &'static str,
    pub source: &'static str,
}

const ZSET_SET_BY_SCORE: ScriptDef = ScriptDef {
    name: "zset_set_by_score",
    source: r"
local key = KEYS[1]
local min_score = ARGV[1]
local max_score = ARGV[2]
local set_score = ARGV[3]
local num = ARGV[4]

local datas = nil
if num ~= '' then
    datas = redis.call('zrangebyscore', key, min_score, max_score, 'withscores', 'limit', 0, num)
else
    datas = redis.call('zrangebyscore', key, min_score, max_score, 'withscores')
end

local item_list = {}
for i=1, #datas, 2 do
    table.insert(item_list, datas[i])
    redis.call('zadd', key, set_score, datas[i])
end
return item_list
",
};

const ZSET_INCR_BY_SCORE: ScriptDef = ScriptDef {
    name: "zset_incr_by_score",
    source: r"
local key = KEYS[1]
local min_score = ARGV[1]
local max_score = ARGV[2]
local increment = ARGV[3]
local num = ARGV[4]

local datas = nil
if num ~= '' then
    datas = redis.call('zrangebyscore', key, min_score, max_score, 'withscores', 'limit', 0, num)
else
    datas = redis.call('zrangebyscore', key, min_score, max_score, 'withscores')
end

local item_list = {}
for i=1, #datas, 2 do
    table.insert(item_list, datas[i])
    redis.call('zincrby', key, increment, datas[i])
end
return item_list
",
};

const ZSET_DEL_BY_SCORE: ScriptDef = ScriptDef {
    name: "zset_del_by_score",
    source: r"
local key = KEYS[1]
local min_score = ARGV[1]
local max_score = ARGV[2]
local num = ARGV[3]

local datas = nil
if num ~= '' then
    datas = redis.call('zrangebyscore', key, min_score, max_score, 'withscores', 'limit', 0, num)
else
    datas = redis.call('zrangebyscore', key, min_score, max_score, 'withscores')
end

local item_list = {}
for i=1, #datas, 2 do
    table.insert(item_list, datas[i])
    redis.call('zrem', key, datas[i])
end
return item_list
",
};

static BUILTIN: Lazy<ScriptRegistry> = Lazy::new(|| {
    let mut r = ScriptRegistry::empty();
    r.register(ScriptKind::ZsetSetByScore, ZSET_SET_BY_SCORE);
    r.register(ScriptKind::ZsetIncrByScore, ZSET_INCR_BY_SCORE);
    r.register(ScriptKind::ZsetDelByScore, ZSET_DEL_BY_SCORE);
    r
});

/// Explicit operation-name → definition mapping, built once and validated
/// eagerly at client construction instead of discovered from a script
/// directory at runtime.
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<ScriptKind, ScriptDef>,
}

impl ScriptRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry carrying all built-in operations.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    pub fn register(&mut self, kind: ScriptKind, def: ScriptDef) {
        self.scripts.insert(kind, def);
    }

    pub fn get(&self, kind: ScriptKind) -> Result<&ScriptDef, StoreError> {
        self.scripts.get(&kind).ok_or_else(|| StoreError::MissingScript(kind.name().to_string()))
    }

    /// Fails fast if any required atomic operation is missing.
    pub fn validate(&self) -> Result<(), StoreError> {
        for kind in ScriptKind::ALL {
            self.get(kind)?;
        }
        Ok(())
    }
}
