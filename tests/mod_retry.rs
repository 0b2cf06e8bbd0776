use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bson::doc;
use bulksync::document::Document;
use bulksync::mutation::{BulkOutcome, MutationOp};
use bulksync::paginate::PageOptions;
use bulksync::query::{Filter, FindOptions};
use bulksync::store::{DocumentStore, MemoryCollection, MemoryStore};
use bulksync::{DocClient, RetryPolicy, StoreError};

/// Wraps a collection and fails the first `failures` store calls with a
/// transient error.
struct Flaky {
    inner: MemoryCollection,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl Flaky {
    fn new(inner: MemoryCollection, failures: u32) -> Self {
        Self { inner, failures: AtomicU32::new(failures), calls: AtomicU32::new(0) }
    }

    fn gate(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(StoreError::Connection("injected".into()))
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for Flaky {
    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, StoreError> {
        self.gate()?;
        self.inner.find(filter, opts).await
    }

    async fn bulk_apply(&self, ops: &[MutationOp], ordered: bool) -> Result<BulkOutcome, StoreError> {
        self.gate()?;
        self.inner.bulk_apply(ops, ordered).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.gate()?;
        self.inner.count(filter).await
    }

    async fn estimated_count(&self) -> Result<u64, StoreError> {
        self.gate()?;
        self.inner.estimated_count().await
    }
}

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1))
}

#[tokio::test]
async fn async_run_retries_transient_errors() {
    let calls = AtomicU32::new(0);
    let out = fast_policy(4)
        .run(async || {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Timeout("slow".into()))
            } else {
                Ok(42)
            }
        })
        .await;
    assert_eq!(out.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhaustion_carries_the_last_error() {
    let out = fast_policy(3)
        .run::<(), _>(async || Err(StoreError::Connection("down".into())))
        .await;
    match out {
        Err(StoreError::RetryExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, StoreError::Connection(_)));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn write_survives_transient_store_failures() {
    let store = MemoryStore::new();
    let flaky = Flaky::new(store.collection("c"), 2);
    let client = DocClient::with_retry(flaky, fast_policy(5));

    let out = client.write(&[Document::new(doc! { "_id": 1, "v": 1 })]).await.unwrap();
    assert!(out.success);
    assert_eq!(out.upserted, 1);
    assert_eq!(client.store().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn pagination_retries_each_fetch() {
    let store = MemoryStore::new();
    let col = store.collection("c");
    let docs: Vec<Document> = (0..10).map(|i| Document::new(doc! { "_id": i })).collect();
    DocClient::new(col.clone()).write(&docs).await.unwrap();

    // first count call and first find call both fail once
    let flaky = Flaky::new(col, 2);
    let client = DocClient::with_retry(flaky, fast_policy(4));
    let all = client
        .paginate(Filter::True, PageOptions { page_size: Some(4), ..PageOptions::default() })
        .collect_all()
        .await
        .unwrap();
    assert_eq!(all.len(), 10);
}

#[tokio::test]
async fn non_transient_errors_are_not_retried() {
    struct Broken;
    impl DocumentStore for Broken {
        async fn find(&self, _: &Filter, _: &FindOptions) -> Result<Vec<Document>, StoreError> {
            Err(StoreError::BadFilter("nope".into()))
        }
        async fn bulk_apply(
            &self,
            _: &[MutationOp],
            _: bool,
        ) -> Result<BulkOutcome, StoreError> {
            Err(StoreError::BadFilter("nope".into()))
        }
        async fn count(&self, _: &Filter) -> Result<u64, StoreError> {
            Err(StoreError::BadFilter("nope".into()))
        }
        async fn estimated_count(&self) -> Result<u64, StoreError> {
            Err(StoreError::BadFilter("nope".into()))
        }
    }

    let client = DocClient::with_retry(Broken, fast_policy(5));
    let out = client.write(&[Document::new(doc! { "_id": 1 })]).await;
    assert!(matches!(out, Err(StoreError::BadFilter(_))));
}
