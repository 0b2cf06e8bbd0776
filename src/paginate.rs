use std::collections::VecDeque;

use bson::Bson;

use crate::count::total_count;
use crate::document::{Document, ID_FIELD};
use crate::errors::StoreError;
use crate::query::{Filter, FindOptions, SortSpec};
use crate::retry::RetryPolicy;
use crate::store::DocumentStore;

pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Server-side fetches pull this many pages' worth of documents per round
/// trip, amortizing latency while keeping cursor memory bounded.
const FETCH_FACTOR: usize = 50;

/// One emitted page: documents in ascending identity order, at most
/// `page_size` of them.
pub type Page = Vec<Document>;

#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    /// Fields to return. The identity field is always included, even when
    /// this list omits it, because traversal resumes by identity.
    pub return_fields: Option<Vec<String>>,
    /// How many documents to traverse in total. `None` means all matching,
    /// resolved through the count estimator on first use.
    pub total: Option<u64>,
    /// Emitted page size; defaults to [`DEFAULT_PAGE_SIZE`].
    pub page_size: Option<usize>,
}

/// Traversal position. Owned by exactly one [`Paginator`] for its lifetime;
/// never shared across concurrent traversals.
#[derive(Debug, Clone)]
pub struct CursorState {
    filter: Filter,
    projection: Option<Vec<String>>,
    last_seen_id: Option<Bson>,
    fetched: u64,
    target: Option<u64>,
    page_size: usize,
    cache_size: usize,
}

impl CursorState {
    /// Identity of the last emitted document, usable as a resume token.
    #[must_use]
    pub fn last_seen_id(&self) -> Option<&Bson> {
        self.last_seen_id.as_ref()
    }

    /// Documents emitted so far.
    #[must_use]
    pub const fn fetched(&self) -> u64 {
        self.fetched
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Per-round-trip fetch bound; 0 until the target is resolved.
    #[must_use]
    pub const fn cache_size(&self) -> usize {
        self.cache_size
    }
}

/// Keyset-paginated pull stream over a filtered, identity-ordered result
/// set.
///
/// Each round trip fetches at most `cache_size` documents with
/// `filter AND identity > bound`, sorted ascending by identity; pages of
/// `page_size` are carved out of those batches as the caller pulls them.
/// Memory never exceeds one fetch batch. The caller may stop pulling at any
/// point; fetches are bounded and fully materialized, so dropping the
/// paginator releases everything it holds.
///
/// Visibility is fixed per fetch batch: documents inserted behind an
/// already-advanced identity bound are not visited, documents inserted
/// ahead of it show up in a later batch.
pub struct Paginator<'a, S: DocumentStore> {
    store: &'a S,
    state: CursorState,
    retry: RetryPolicy,
    /// Fetched but not yet emitted.
    batch: VecDeque<Document>,
    /// Identity bound for the next fetch (last *fetched* identity, which
    /// may be ahead of the last emitted one while the batch drains).
    scan_from: Option<Bson>,
    scanned: u64,
    exhausted: bool,
}

impl<'a, S: DocumentStore> Paginator<'a, S> {
    #[must_use]
    pub fn open(store: &'a S, filter: Filter, opts: PageOptions) -> Self {
        let page_size = opts.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let projection = opts.return_fields.map(|mut fields| {
            if !fields.iter().any(|f| f == ID_FIELD) {
                fields.push(ID_FIELD.to_string());
            }
            fields
        });
        let cache_size = opts.total.map_or(0, |t| Self::cache_for(t, page_size));
        Self {
            store,
            state: CursorState {
                filter,
                projection,
                last_seen_id: None,
                fetched: 0,
                target: opts.total,
                page_size,
                cache_size,
            },
            retry: RetryPolicy::default(),
            batch: VecDeque::new(),
            scan_from: None,
            scanned: 0,
            exhausted: false,
        }
    }

    /// Restarts a traversal after `token`, the last identity a previous
    /// traversal emitted. When no explicit total is given, the target is
    /// resolved against the remaining documents only.
    #[must_use]
    pub fn resume(store: &'a S, filter: Filter, opts: PageOptions, token: Bson) -> Self {
        let mut p = Self::open(store, filter, opts);
        p.state.last_seen_id = Some(token.clone());
        p.scan_from = Some(token);
        p
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn state(&self) -> &CursorState {
        &self.state
    }

    /// Identity of the last emitted document; feed this to [`Self::resume`]
    /// to continue a traversal in a new paginator.
    #[must_use]
    pub fn resume_token(&self) -> Option<&Bson> {
        self.state.last_seen_id()
    }

    const fn cache_for(target: u64, page_size: usize) -> usize {
        let cap = page_size.saturating_mul(FETCH_FACTOR);
        if target < cap as u64 { target as usize } else { cap }
    }

    /// Pulls the next page, or `None` when the traversal is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Page>, StoreError> {
        let target = match self.state.target {
            Some(t) => t,
            None => {
                let t = self.resolve_target().await?;
                self.state.target = Some(t);
                self.state.cache_size = Self::cache_for(t, self.state.page_size);
                t
            }
        };
        if target == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        while self.batch.len() < self.state.page_size && !self.exhausted && self.scanned < target {
            self.fetch_batch(target).await?;
        }
        if self.batch.is_empty() {
            return Ok(None);
        }
        let take = self.state.page_size.min(self.batch.len());
        let page: Page = self.batch.drain(..take).collect();
        self.state.fetched += page.len() as u64;
        if let Some(last) = page.last().and_then(Document::id) {
            self.state.last_seen_id = Some(last.clone());
        }
        Ok(Some(page))
    }

    /// Drains the remaining pages into one vector. Memory is unbounded by
    /// definition here; prefer pulling pages when the result set is large.
    pub async fn collect_all(mut self) -> Result<Vec<Document>, StoreError> {
        let mut out = Vec::new();
        while let Some(mut page) = self.next_page().await? {
            out.append(&mut page);
        }
        Ok(out)
    }

    async fn resolve_target(&mut self) -> Result<u64, StoreError> {
        let store = self.store;
        let filter = self.effective_filter();
        self.retry.run(async || total_count(store, &filter).await).await
    }

    async fn fetch_batch(&mut self, target: u64) -> Result<(), StoreError> {
        let remaining = (target - self.scanned) as usize;
        let limit = self.state.cache_size.min(remaining).max(1);
        let filter = self.effective_filter();
        let opts = FindOptions {
            projection: self.state.projection.clone(),
            sort: Some(vec![SortSpec::id_asc()]),
            limit: Some(limit),
            skip: None,
        };
        let store = self.store;
        let docs = self.retry.run(async || store.find(&filter, &opts).await).await?;
        let got = docs.len();
        match docs.last().and_then(Document::id) {
            Some(last) => self.scan_from = Some(last.clone()),
            // no documents or no identity to advance past: stop fetching
            None => self.exhausted = true,
        }
        if got < limit {
            self.exhausted = true;
        }
        self.scanned += got as u64;
        self.batch.extend(docs);
        Ok(())
    }

    fn effective_filter(&self) -> Filter {
        match &self.scan_from {
            Some(bound) => self.state.filter.with_id_above(bound),
            None => self.state.filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::build_writes;
    use crate::store::MemoryStore;
    use bson::doc;

    async fn seeded(store: &MemoryStore, name: &str, n: i32) -> crate::store::MemoryCollection {
        let col = store.collection(name);
        let docs: Vec<Document> =
            (0..n).map(|i| Document::new(doc! { "_id": i, "v": i })).collect();
        col.bulk_apply(&build_writes(&docs), false).await.unwrap();
        col
    }

    #[tokio::test]
    async fn pages_partition_the_result_set() {
        let store = MemoryStore::new();
        let col = seeded(&store, "c", 25).await;
        let mut p = Paginator::open(
            &col,
            Filter::True,
            PageOptions { page_size: Some(10), ..PageOptions::default() },
        );
        let mut sizes = Vec::new();
        let mut ids = Vec::new();
        while let Some(page) = p.next_page().await.unwrap() {
            sizes.push(page.len());
            ids.extend(page.iter().map(|d| d.data.get_i32("_id").unwrap()));
        }
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
        assert_eq!(p.state().fetched(), 25);
    }

    #[tokio::test]
    async fn zero_match_yields_no_pages() {
        let store = MemoryStore::new();
        let col = seeded(&store, "c", 5).await;
        let mut p = Paginator::open(&col, Filter::eq("v", 99), PageOptions::default());
        assert!(p.next_page().await.unwrap().is_none());
        assert!(p.resume_token().is_none());
    }

    #[tokio::test]
    async fn target_clamps_to_population() {
        let store = MemoryStore::new();
        let col = seeded(&store, "c", 7).await;
        let mut p = Paginator::open(
            &col,
            Filter::True,
            PageOptions { total: Some(100), page_size: Some(4), ..PageOptions::default() },
        );
        let mut total = 0;
        while let Some(page) = p.next_page().await.unwrap() {
            total += page.len();
        }
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn resume_continues_after_token() {
        let store = MemoryStore::new();
        let col = seeded(&store, "c", 12).await;
        let mut first = Paginator::open(
            &col,
            Filter::True,
            PageOptions { page_size: Some(5), ..PageOptions::default() },
        );
        let _ = first.next_page().await.unwrap().unwrap();
        let token = first.resume_token().unwrap().clone();
        drop(first);

        let mut second = Paginator::resume(
            &col,
            Filter::True,
            PageOptions { page_size: Some(5), ..PageOptions::default() },
            token,
        );
        let rest = second.collect_all().await.unwrap();
        let ids: Vec<i32> = rest.iter().map(|d| d.data.get_i32("_id").unwrap()).collect();
        assert_eq!(ids, (5..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn projection_keeps_identity_for_resume() {
        let store = MemoryStore::new();
        let col = seeded(&store, "c", 3).await;
        let mut p = Paginator::open(
            &col,
            Filter::True,
            PageOptions {
                return_fields: Some(vec!["v".to_string()]),
                page_size: Some(2),
                ..PageOptions::default()
            },
        );
        let page = p.next_page().await.unwrap().unwrap();
        assert!(page.iter().all(Document::has_id));
        assert!(p.resume_token().is_some());
    }
}
