use bson::doc;
use bulksync::document::Document;
use bulksync::paginate::{PageOptions, Paginator};
use bulksync::query::Filter;
use bulksync::store::{DocumentStore, MemoryCollection, MemoryStore};
use bulksync::{DocClient, StoreError};
use proptest::prelude::*;
use std::collections::HashSet;

async fn seeded(store: &MemoryStore, name: &str, n: i32) -> MemoryCollection {
    let col = store.collection(name);
    let docs: Vec<Document> = (0..n)
        .map(|i| Document::new(doc! { "_id": i, "grp": i % 3, "v": i }))
        .collect();
    let client = DocClient::new(col.clone());
    client.write(&docs).await.unwrap();
    col
}

#[tokio::test]
async fn pages_partition_the_filtered_set() {
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 90).await;
    let filter = Filter::eq("grp", 1);
    let expected = col.count(&filter).await.unwrap();

    let mut pager = Paginator::open(
        &col,
        filter,
        PageOptions { page_size: Some(7), ..PageOptions::default() },
    );
    let mut seen = HashSet::new();
    let mut sizes = Vec::new();
    while let Some(page) = pager.next_page().await.unwrap() {
        sizes.push(page.len());
        for d in &page {
            assert!(seen.insert(d.data.get_i32("_id").unwrap()), "document emitted twice");
        }
    }
    assert_eq!(seen.len() as u64, expected);
    // every page but the last is exactly page_size
    if let Some((last, full)) = sizes.split_last() {
        assert!(full.iter().all(|s| *s == 7));
        assert!(*last <= 7);
    }
}

#[tokio::test]
async fn zero_match_filter_yields_zero_pages() {
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 20).await;
    let mut pager = Paginator::open(&col, Filter::eq("grp", 99), PageOptions::default());
    assert!(pager.next_page().await.unwrap().is_none());
    assert_eq!(pager.state().fetched(), 0);
}

#[tokio::test]
async fn explicit_total_caps_the_traversal() {
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 50).await;
    let mut pager = Paginator::open(
        &col,
        Filter::True,
        PageOptions { total: Some(13), page_size: Some(5), ..PageOptions::default() },
    );
    let mut total = 0usize;
    while let Some(page) = pager.next_page().await.unwrap() {
        total += page.len();
    }
    assert_eq!(total, 13);
    assert_eq!(pager.state().fetched(), 13);
}

#[tokio::test]
async fn return_fields_projects_but_keeps_identity() {
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 6).await;
    let client = DocClient::new(col);
    let docs = client
        .fetch_all(&Filter::True, Some(vec!["v".to_string()]))
        .await
        .unwrap();
    assert_eq!(docs.len(), 6);
    for d in &docs {
        assert!(d.has_id());
        assert!(d.data.get("v").is_some());
        assert!(d.data.get("grp").is_none());
    }
}

#[tokio::test]
async fn resume_token_restarts_where_the_last_page_ended() {
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 30).await;
    let client = DocClient::new(col);

    let mut first = client.paginate(
        Filter::True,
        PageOptions { page_size: Some(8), ..PageOptions::default() },
    );
    let page = first.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 8);
    let token = first.resume_token().unwrap().clone();
    drop(first);

    let rest = client
        .resume(
            Filter::True,
            PageOptions { page_size: Some(8), ..PageOptions::default() },
            token,
        )
        .collect_all()
        .await
        .unwrap();
    let ids: Vec<i32> = rest.iter().map(|d| d.data.get_i32("_id").unwrap()).collect();
    assert_eq!(ids, (8..30).collect::<Vec<_>>());
}

#[tokio::test]
async fn json_filters_drive_pagination_too() {
    let _ = bulksync::logger::init();
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 30).await;
    let filter = bulksync::query::parse_filter_json(r#"{"field":"v","$lt":10}"#).unwrap();
    let docs = DocClient::new(col).fetch_all(&filter, None).await.unwrap();
    assert_eq!(docs.len(), 10);
}

#[tokio::test]
async fn find_one_returns_lowest_identity_match() {
    let store = MemoryStore::new();
    let col = seeded(&store, "c", 10).await;
    let client = DocClient::new(col);
    let found = client.find_one(&Filter::eq("grp", 2)).await.unwrap().unwrap();
    assert_eq!(found.data.get_i32("_id").unwrap(), 2);
    assert!(client.find_one(&Filter::eq("grp", 42)).await.unwrap().is_none());
}

fn run_partition_case(n: usize, page_size: usize) -> Result<(), TestCaseError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    rt.block_on(async {
        let store = MemoryStore::new();
        let col = store.collection("p");
        let docs: Vec<Document> =
            (0..n as i64).map(|i| Document::new(doc! { "_id": i, "v": i })).collect();
        DocClient::new(col.clone()).write(&docs).await.unwrap();

        let mut pager = Paginator::open(
            &col,
            Filter::True,
            PageOptions { page_size: Some(page_size), ..PageOptions::default() },
        );
        let mut ids = Vec::new();
        let mut sizes = Vec::new();
        loop {
            match pager.next_page().await {
                Ok(Some(page)) => {
                    sizes.push(page.len());
                    ids.extend(page.iter().map(|d| d.data.get_i64("_id").unwrap()));
                }
                Ok(None) => break,
                Err(e) => return Err::<(), StoreError>(e),
            }
        }
        // exact partition: all ids once, in order, full pages except the last
        assert_eq!(ids, (0..n as i64).collect::<Vec<_>>());
        if let Some((last, full)) = sizes.split_last() {
            assert!(full.iter().all(|s| *s == page_size));
            assert!(*last <= page_size && *last > 0);
        } else {
            assert_eq!(n, 0);
        }
        Ok(())
    })
    .map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn pagination_partitions_any_population(n in 0usize..300, page_size in 1usize..40) {
        run_partition_case(n, page_size)?;
    }
}
