use crate::errors::StoreError;
use crate::mutation::{BulkExecutor, build_writes};
use crate::paginate::{PageOptions, Paginator};
use crate::query::Filter;
use crate::retry::RetryPolicy;
use crate::store::DocumentStore;

/// Streams every document of `source` into `dest`, one page at a time.
///
/// Memory stays bounded by `page_size` documents; the source collection is
/// never materialized. Writes are idempotent upserts, so a retried page is
/// harmless, but failed pages are not rolled back: semantics are
/// at-least-once, not exactly-once. On failure the error carries how many
/// documents had been copied.
pub async fn copy<S, D>(source: &S, dest: &D, page_size: usize) -> Result<u64, StoreError>
where
    S: DocumentStore,
    D: DocumentStore,
{
    copy_with_retry(source, dest, page_size, RetryPolicy::default()).await
}

pub async fn copy_with_retry<S, D>(
    source: &S,
    dest: &D,
    page_size: usize,
    retry: RetryPolicy,
) -> Result<u64, StoreError>
where
    S: DocumentStore,
    D: DocumentStore,
{
    let mut pager = Paginator::open(
        source,
        Filter::True,
        PageOptions { page_size: Some(page_size), ..PageOptions::default() },
    )
    .with_retry(retry);
    let executor = BulkExecutor::with_retry(dest, retry);

    let mut copied = 0u64;
    loop {
        let page = match pager.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(e) => return Err(StoreError::CopyAborted { copied, source: Box::new(e) }),
        };
        let ops = build_writes(&page);
        match executor.execute(&ops).await {
            Ok(outcome) if outcome.success => {
                copied += page.len() as u64;
                log::debug!("copy progress: {copied} documents");
            }
            Ok(outcome) => {
                return Err(StoreError::CopyAborted {
                    copied,
                    source: Box::new(StoreError::PartialBulk { failed: outcome.failures.len() }),
                });
            }
            Err(e) => return Err(StoreError::CopyAborted { copied, source: Box::new(e) }),
        }
    }
    log::info!("copy complete: {copied} documents");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::store::MemoryStore;
    use bson::doc;

    #[tokio::test]
    async fn empty_source_copies_nothing() {
        let store = MemoryStore::new();
        let src = store.collection("src");
        let dst = store.collection("dst");
        assert_eq!(copy(&src, &dst, 100).await.unwrap(), 0);
        assert!(dst.is_empty());
    }

    #[tokio::test]
    async fn copy_preserves_identity_and_fields() {
        let store = MemoryStore::new();
        let src = store.collection("src");
        let dst = store.collection("dst");
        let docs: Vec<Document> =
            (0..7).map(|i| Document::new(doc! { "_id": i, "v": i * 2 })).collect();
        src.bulk_apply(&build_writes(&docs), false).await.unwrap();

        assert_eq!(copy(&src, &dst, 3).await.unwrap(), 7);
        for d in &docs {
            assert_eq!(dst.get(d.id().unwrap()).as_ref(), Some(d));
        }
    }
}
