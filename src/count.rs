use crate::errors::StoreError;
use crate::query::Filter;
use crate::store::DocumentStore;

/// Resolves how many documents match `filter`.
///
/// An empty filter is answered with the store's fast approximate count,
/// which can lag briefly behind bulk mutations; any real predicate forces
/// the exact count. Approximate is good enough to size a pagination target,
/// exact is required once a predicate narrows the set.
pub async fn total_count<S: DocumentStore>(store: &S, filter: &Filter) -> Result<u64, StoreError> {
    if filter.is_empty() { store.estimated_count().await } else { store.count(filter).await }
}
