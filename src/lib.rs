pub mod copy;
pub mod count;
pub mod document;
pub mod errors;
pub mod kv;
pub mod logger;
pub mod mutation;
pub mod paginate;
pub mod query;
pub mod retry;
pub mod store;

pub use document::{Document, ID_FIELD};
pub use errors::StoreError;
pub use mutation::BulkOutcome;
pub use paginate::{Page, PageOptions, Paginator};
pub use query::Filter;
pub use retry::RetryPolicy;

use bson::Bson;

use crate::kv::{
    KeyContents, KeyType, KvStore, ScoreRange, ScoreRangeOp, ScriptRegistry, mutate_score_range,
};
use crate::mutation::{BulkExecutor, build_deletes, build_writes};
use crate::query::{FindOptions, SortSpec};
use crate::store::DocumentStore;

/// Document-side facade: wraps one collection handle and exposes the
/// synchronization surface on top of it.
///
/// Plain composition: the handle stays a field, nothing is inherited from
/// the underlying client.
pub struct DocClient<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> DocClient<S> {
    pub fn new(store: S) -> Self {
        Self { store, retry: RetryPolicy::default() }
    }

    pub fn with_retry(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a keyset-paginated traversal over `filter`.
    pub fn paginate(&self, filter: Filter, opts: PageOptions) -> Paginator<'_, S> {
        Paginator::open(&self.store, filter, opts).with_retry(self.retry)
    }

    /// Continues a traversal after a resume token taken from an earlier
    /// paginator.
    pub fn resume(&self, filter: Filter, opts: PageOptions, token: Bson) -> Paginator<'_, S> {
        Paginator::resume(&self.store, filter, opts, token).with_retry(self.retry)
    }

    /// Writes documents in one idempotent unordered batch: identities are
    /// upserted, identity-less documents inserted. An empty slice is a
    /// successful no-op.
    pub async fn write(&self, docs: &[Document]) -> Result<BulkOutcome, StoreError> {
        let ops = build_writes(docs);
        BulkExecutor::with_retry(&self.store, self.retry).execute(&ops).await
    }

    /// Deletes documents by identity. Documents without one are skipped and
    /// counted in the outcome, never an error.
    pub async fn delete(&self, docs: &[Document]) -> Result<BulkOutcome, StoreError> {
        let (ops, skipped) = build_deletes(docs);
        let mut outcome = BulkExecutor::with_retry(&self.store, self.retry).execute(&ops).await?;
        outcome.skipped = skipped;
        Ok(outcome)
    }

    /// Stream-copies this collection into `dest`; see [`copy::copy`].
    pub async fn copy_to<D: DocumentStore>(
        &self,
        dest: &D,
        page_size: usize,
    ) -> Result<u64, StoreError> {
        copy::copy_with_retry(&self.store, dest, page_size, self.retry).await
    }

    /// Estimated count for an empty filter, exact count otherwise.
    pub async fn total_count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let store = &self.store;
        self.retry.run(async || count::total_count(store, filter).await).await
    }

    /// First matching document in identity order, if any.
    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let opts = FindOptions {
            sort: Some(vec![SortSpec::id_asc()]),
            limit: Some(1),
            ..FindOptions::default()
        };
        let store = &self.store;
        let docs = self.retry.run(async || store.find(filter, &opts).await).await?;
        Ok(docs.into_iter().next())
    }

    /// Every matching document, traversed in bounded pages but returned as
    /// one vector.
    pub async fn fetch_all(
        &self,
        filter: &Filter,
        return_fields: Option<Vec<String>>,
    ) -> Result<Vec<Document>, StoreError> {
        self.paginate(filter.clone(), PageOptions { return_fields, ..PageOptions::default() })
            .collect_all()
            .await
    }
}

/// Key-value facade: score-range mutation over sorted sets plus the typed
/// count and bulk-write helpers.
pub struct KvClient<K: KvStore> {
    store: K,
    scripts: ScriptRegistry,
}

impl<K: KvStore> KvClient<K> {
    /// Builds a client over the built-in script registry. Registry
    /// validation happens here, eagerly: a missing required atomic
    /// operation is a construction error.
    pub fn new(store: K) -> Result<Self, StoreError> {
        Self::with_registry(store, ScriptRegistry::builtin().clone())
    }

    pub fn with_registry(store: K, scripts: ScriptRegistry) -> Result<Self, StoreError> {
        scripts.validate()?;
        Ok(Self { store, scripts })
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// Sets every member scored in `[min, max]` to `value`; returns the
    /// affected members in ascending prior-score order.
    pub async fn set_score_range(
        &self,
        key: &str,
        min: f64,
        max: f64,
        value: f64,
        limit: Option<u64>,
    ) -> Result<Vec<String>, StoreError> {
        let range = ScoreRange { min, max, limit };
        mutate_score_range(&self.store, &self.scripts, key, range, ScoreRangeOp::SetScore(value))
            .await
    }

    /// Adds `delta` to every member scored in `[min, max]`; the member list
    /// reflects scores before the increment.
    pub async fn increment_score_range(
        &self,
        key: &str,
        min: f64,
        max: f64,
        delta: f64,
        limit: Option<u64>,
    ) -> Result<Vec<String>, StoreError> {
        let range = ScoreRange { min, max, limit };
        mutate_score_range(&self.store, &self.scripts, key, range, ScoreRangeOp::Increment(delta))
            .await
    }

    /// Removes every member scored in `[min, max]`; returns what was
    /// removed.
    pub async fn delete_score_range(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<u64>,
    ) -> Result<Vec<String>, StoreError> {
        let range = ScoreRange { min, max, limit };
        mutate_score_range(&self.store, &self.scripts, key, range, ScoreRangeOp::Delete).await
    }

    /// Members scored in `[min, max]` without touching them, ascending,
    /// optionally capped. The read-only sibling of the mutating range ops;
    /// it needs no atomicity, so it bypasses the script registry.
    pub async fn fetch_score_range(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<u64>,
    ) -> Result<Vec<String>, StoreError> {
        self.store.zset_range_by_score(key, min, max, limit).await
    }

    /// Full contents of `key`, shaped by its type; `None` for a missing
    /// key. List, set and sorted-set contents are read in `page_size`
    /// chunks so no single round trip is unbounded.
    pub async fn fetch_key(
        &self,
        key: &str,
        page_size: u64,
    ) -> Result<Option<KeyContents>, StoreError> {
        let Some(kind) = self.store.key_type(key).await? else {
            return Ok(None);
        };
        let page = page_size.max(1);
        let store = &self.store;
        let contents = match kind {
            KeyType::String => match store.get_string(key).await? {
                Some(s) => KeyContents::String(s),
                None => return Ok(None),
            },
            KeyType::List => KeyContents::List(
                drain_pages(page, async |off, n| store.list_range(key, off, n).await).await?,
            ),
            KeyType::Set => KeyContents::Set(
                drain_pages(page, async |off, n| store.set_scan(key, off, n).await).await?,
            ),
            KeyType::SortedSet => KeyContents::SortedSet(
                drain_pages(page, async |off, n| store.zset_scan(key, off, n).await).await?,
            ),
            KeyType::Hash => KeyContents::Hash(store.hash_entries(key).await?),
        };
        Ok(Some(contents))
    }

    /// Element count of `key`, whatever its type; 0 for a missing key.
    pub async fn count(&self, key: &str) -> Result<u64, StoreError> {
        let Some(kind) = self.store.key_type(key).await? else {
            return Ok(0);
        };
        match kind {
            KeyType::String => self.store.string_len(key).await,
            KeyType::List => self.store.list_len(key).await,
            KeyType::Set => self.store.set_len(key).await,
            KeyType::SortedSet => self.store.zset_len(key).await,
            KeyType::Hash => self.store.hash_len(key).await,
        }
    }

    /// Bulk-adds members to a sorted set at one score; returns how many
    /// were newly inserted.
    pub async fn write_zset(
        &self,
        key: &str,
        members: &[String],
        score: f64,
    ) -> Result<u64, StoreError> {
        let added = self.store.zset_add(key, members, score).await?;
        log::debug!(
            "zset {key}: inserted {added}, rescored {}, total {}",
            members.len() as u64 - added,
            members.len()
        );
        Ok(added)
    }
}

/// Pulls `page`-sized chunks at increasing offsets until a short chunk
/// signals the end.
async fn drain_pages<T, F>(page: u64, mut fetch: F) -> Result<Vec<T>, StoreError>
where
    F: AsyncFnMut(u64, u64) -> Result<Vec<T>, StoreError>,
{
    let mut items = Vec::new();
    loop {
        let chunk = fetch(items.len() as u64, page).await?;
        let short = (chunk.len() as u64) < page;
        items.extend(chunk);
        if short {
            return Ok(items);
        }
    }
}
