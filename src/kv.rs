mod memory;
mod script;
mod zset;

pub use memory::MemoryKv;
pub use script::{ScriptDef, ScriptKind, ScriptRegistry};
pub use zset::{ScoreRange, ScoreRangeOp, mutate_score_range};

use crate::errors::StoreError;

/// The shape a key holds, resolved once per call and dispatched on as an
/// enum rather than an open-ended type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    String,
    List,
    Set,
    SortedSet,
    Hash,
}

impl KeyType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::SortedSet => "zset",
            Self::Hash => "hash",
        }
    }
}

/// Full contents of a key, shaped by its resolved [`KeyType`]. Collection
/// kinds are assembled from bounded page reads; see `KvClient::fetch_key`.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyContents {
    String(String),
    List(Vec<String>),
    Set(Vec<String>),
    SortedSet(Vec<(String, f64)>),
    Hash(Vec<(String, String)>),
}

/// Argument to an atomic script, typed instead of stringly encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Int(i64),
    Float(f64),
    Str(String),
    /// An omitted optional argument (e.g. no member limit).
    Nil,
}

/// Key-value store handle as this layer consumes it.
///
/// `run_script` must execute the whole fetch-and-mutate sequence as one
/// indivisible unit relative to other clients; everything the score-range
/// operations guarantee rests on that.
#[allow(async_fn_in_trait)]
pub trait KvStore {
    /// The type of `key`, or `None` if the key does not exist.
    async fn key_type(&self, key: &str) -> Result<Option<KeyType>, StoreError>;

    /// Runs a registered atomic operation. All-or-nothing: a failure means
    /// no partial effect is assumed.
    async fn run_script(
        &self,
        script: &ScriptDef,
        keys: &[String],
        args: &[ScriptArg],
    ) -> Result<Vec<String>, StoreError>;

    async fn string_len(&self, key: &str) -> Result<u64, StoreError>;
    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;
    async fn set_len(&self, key: &str) -> Result<u64, StoreError>;
    async fn zset_len(&self, key: &str) -> Result<u64, StoreError>;
    async fn hash_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Adds members to a sorted set at the given score, returning how many
    /// were newly inserted (existing members are rescored, not counted).
    async fn zset_add(&self, key: &str, members: &[String], score: f64)
    -> Result<u64, StoreError>;

    /// Members scored within `[min, max]`, ascending, optionally capped.
    /// A plain read: no script, no mutation.
    async fn zset_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<u64>,
    ) -> Result<Vec<String>, StoreError>;

    /// Value of a string key, `None` if the key does not exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// `count` list elements starting at `offset`, in list order.
    async fn list_range(&self, key: &str, offset: u64, count: u64)
    -> Result<Vec<String>, StoreError>;

    /// `count` set members starting at `offset` of a stable member order.
    async fn set_scan(&self, key: &str, offset: u64, count: u64)
    -> Result<Vec<String>, StoreError>;

    /// `count` members with scores starting at `offset` of the ascending
    /// (score, member) order.
    async fn zset_scan(&self, key: &str, offset: u64, count: u64)
    -> Result<Vec<(String, f64)>, StoreError>;

    /// All field/value pairs of a hash key.
    async fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError>;
}
