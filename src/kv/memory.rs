use std::collections::{HashMap, HashSet};

use ordered_float::OrderedFloat;
use parking_lot::Mutex;

use crate::errors::StoreError;
use crate::kv::{KeyType, KvStore, ScriptArg, ScriptDef};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Set(HashSet<String>),
    ZSet(HashMap<String, f64>),
    Hash(HashMap<String, String>),
}

impl Value {
    const fn key_type(&self) -> KeyType {
        match self {
            Self::Str(_) => KeyType::String,
            Self::List(_) => KeyType::List,
            Self::Set(_) => KeyType::Set,
            Self::ZSet(_) => KeyType::SortedSet,
            Self::Hash(_) => KeyType::Hash,
        }
    }
}

/// In-memory key-value store. One mutex guards the whole keyspace, so a
/// script call holds it for its entire fetch-and-mutate sequence; that is
/// the atomicity the trait demands.
#[derive(Default)]
pub struct MemoryKv {
    keys: Mutex<HashMap<String, Value>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.keys.lock().insert(key.to_string(), Value::Str(value.to_string()));
    }

    pub fn list_push(&self, key: &str, items: &[&str]) {
        let mut map = self.keys.lock();
        let entry = map.entry(key.to_string()).or_insert_with(|| Value::List(Vec::new()));
        if let Value::List(l) = entry {
            l.extend(items.iter().map(ToString::to_string));
        }
    }

    pub fn set_add(&self, key: &str, members: &[&str]) {
        let mut map = self.keys.lock();
        let entry = map.entry(key.to_string()).or_insert_with(|| Value::Set(HashSet::new()));
        if let Value::Set(s) = entry {
            s.extend(members.iter().map(ToString::to_string));
        }
    }

    pub fn hash_set(&self, key: &str, field: &str, value: &str) {
        let mut map = self.keys.lock();
        let entry = map.entry(key.to_string()).or_insert_with(|| Value::Hash(HashMap::new()));
        if let Value::Hash(h) = entry {
            h.insert(field.to_string(), value.to_string());
        }
    }

    /// Current score of a sorted-set member, if both exist.
    #[must_use]
    pub fn score(&self, key: &str, member: &str) -> Option<f64> {
        match self.keys.lock().get(key) {
            Some(Value::ZSet(z)) => z.get(member).copied(),
            _ => None,
        }
    }

    fn wrong_type(key: &str, found: &Value, expected: KeyType) -> StoreError {
        StoreError::WrongKeyType {
            key: key.to_string(),
            expected: expected.as_str(),
            found: found.key_type().as_str(),
        }
    }

    fn typed_len(&self, key: &str, expected: KeyType) -> Result<u64, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(0),
            Some(v) if v.key_type() != expected => Err(Self::wrong_type(key, v, expected)),
            Some(Value::Str(s)) => Ok(s.len() as u64),
            Some(Value::List(l)) => Ok(l.len() as u64),
            Some(Value::Set(s)) => Ok(s.len() as u64),
            Some(Value::ZSet(z)) => Ok(z.len() as u64),
            Some(Value::Hash(h)) => Ok(h.len() as u64),
        }
    }
}

/// Members scored within `[min, max]`, ascending by (score, member),
/// optionally capped. Every score-range operation starts from this
/// selection.
fn zrange_by_score(
    zset: &HashMap<String, f64>,
    min: f64,
    max: f64,
    limit: Option<usize>,
) -> Vec<String> {
    let mut members: Vec<(OrderedFloat<f64>, String)> = zset
        .iter()
        .filter(|&(_, s)| *s >= min && *s <= max)
        .map(|(m, s)| (OrderedFloat(*s), m.clone()))
        .collect();
    members.sort();
    if let Some(n) = limit {
        members.truncate(n);
    }
    members.into_iter().map(|(_, m)| m).collect()
}

fn arg_f64(args: &[ScriptArg], i: usize, script: &str) -> Result<f64, StoreError> {
    match args.get(i) {
        Some(ScriptArg::Float(f)) => Ok(*f),
        Some(ScriptArg::Int(n)) => Ok(*n as f64),
        other => Err(StoreError::Atomic {
            name: script.to_string(),
            detail: format!("argument {i} must be numeric, got {other:?}"),
        }),
    }
}

fn arg_limit(args: &[ScriptArg], i: usize, script: &str) -> Result<Option<usize>, StoreError> {
    match args.get(i) {
        None | Some(ScriptArg::Nil) => Ok(None),
        Some(ScriptArg::Int(n)) if *n >= 0 => Ok(Some(*n as usize)),
        other => Err(StoreError::Atomic {
            name: script.to_string(),
            detail: format!("argument {i} must be a non-negative limit, got {other:?}"),
        }),
    }
}

impl KvStore for MemoryKv {
    async fn key_type(&self, key: &str) -> Result<Option<KeyType>, StoreError> {
        Ok(self.keys.lock().get(key).map(Value::key_type))
    }

    async fn run_script(
        &self,
        script: &ScriptDef,
        keys: &[String],
        args: &[ScriptArg],
    ) -> Result<Vec<String>, StoreError> {
        let key = keys.first().ok_or_else(|| StoreError::Atomic {
            name: script.name.to_string(),
            detail: "no key supplied".to_string(),
        })?;
        // single lock for the whole call: fetch and mutate are indivisible
        let mut map = self.keys.lock();
        let zset = match map.get_mut(key) {
            None => return Ok(Vec::new()),
            Some(Value::ZSet(z)) => z,
            Some(v) => return Err(Self::wrong_type(key, v, KeyType::SortedSet)),
        };
        let min = arg_f64(args, 0, script.name)?;
        let max = arg_f64(args, 1, script.name)?;
        match script.name {
            "zset_set_by_score" => {
                let new_score = arg_f64(args, 2, script.name)?;
                let members = zrange_by_score(zset, min, max, arg_limit(args, 3, script.name)?);
                for m in &members {
                    zset.insert(m.clone(), new_score);
                }
                Ok(members)
            }
            "zset_incr_by_score" => {
                let delta = arg_f64(args, 2, script.name)?;
                let members = zrange_by_score(zset, min, max, arg_limit(args, 3, script.name)?);
                for m in &members {
                    if let Some(s) = zset.get_mut(m) {
                        *s += delta;
                    }
                }
                Ok(members)
            }
            "zset_del_by_score" => {
                let members = zrange_by_score(zset, min, max, arg_limit(args, 2, script.name)?);
                for m in &members {
                    zset.remove(m);
                }
                Ok(members)
            }
            other => Err(StoreError::Atomic {
                name: other.to_string(),
                detail: "unrecognized operation".to_string(),
            }),
        }
    }

    async fn string_len(&self, key: &str) -> Result<u64, StoreError> {
        self.typed_len(key, KeyType::String)
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        self.typed_len(key, KeyType::List)
    }

    async fn set_len(&self, key: &str) -> Result<u64, StoreError> {
        self.typed_len(key, KeyType::Set)
    }

    async fn zset_len(&self, key: &str) -> Result<u64, StoreError> {
        self.typed_len(key, KeyType::SortedSet)
    }

    async fn hash_len(&self, key: &str) -> Result<u64, StoreError> {
        self.typed_len(key, KeyType::Hash)
    }

    async fn zset_add(
        &self,
        key: &str,
        members: &[String],
        score: f64,
    ) -> Result<u64, StoreError> {
        let mut map = self.keys.lock();
        let entry = map.entry(key.to_string()).or_insert_with(|| Value::ZSet(HashMap::new()));
        let zset = match entry {
            Value::ZSet(z) => z,
            v => return Err(Self::wrong_type(key, v, KeyType::SortedSet)),
        };
        let mut added = 0u64;
        for m in members {
            if zset.insert(m.clone(), score).is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn zset_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<u64>,
    ) -> Result<Vec<String>, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Value::ZSet(z)) => Ok(zrange_by_score(z, min, max, limit.map(|n| n as usize))),
            Some(v) => Err(Self::wrong_type(key, v, KeyType::SortedSet)),
        }
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(v) => Err(Self::wrong_type(key, v, KeyType::String)),
        }
    }

    async fn list_range(
        &self,
        key: &str,
        offset: u64,
        count: u64,
    ) -> Result<Vec<String>, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(l)) => {
                Ok(l.iter().skip(offset as usize).take(count as usize).cloned().collect())
            }
            Some(v) => Err(Self::wrong_type(key, v, KeyType::List)),
        }
    }

    async fn set_scan(
        &self,
        key: &str,
        offset: u64,
        count: u64,
    ) -> Result<Vec<String>, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(s)) => {
                // sorted so successive offsets walk a stable order
                let mut members: Vec<String> = s.iter().cloned().collect();
                members.sort();
                Ok(members.into_iter().skip(offset as usize).take(count as usize).collect())
            }
            Some(v) => Err(Self::wrong_type(key, v, KeyType::Set)),
        }
    }

    async fn zset_scan(
        &self,
        key: &str,
        offset: u64,
        count: u64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Value::ZSet(z)) => {
                let mut pairs: Vec<(OrderedFloat<f64>, String)> =
                    z.iter().map(|(m, s)| (OrderedFloat(*s), m.clone())).collect();
                pairs.sort();
                Ok(pairs
                    .into_iter()
                    .skip(offset as usize)
                    .take(count as usize)
                    .map(|(s, m)| (m, s.0))
                    .collect())
            }
            Some(v) => Err(Self::wrong_type(key, v, KeyType::SortedSet)),
        }
    }

    async fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let map = self.keys.lock();
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(h)) => {
                let mut entries: Vec<(String, String)> =
                    h.iter().map(|(f, v)| (f.clone(), v.clone())).collect();
                entries.sort();
                Ok(entries)
            }
            Some(v) => Err(Self::wrong_type(key, v, KeyType::Hash)),
        }
    }
}
