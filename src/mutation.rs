use bson::{Bson, Document as BsonDocument};

use crate::document::Document;
use crate::errors::StoreError;
use crate::retry::RetryPolicy;
use crate::store::DocumentStore;

/// A single store mutation, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Replace all fields of the document with this identity, inserting it
    /// if absent. Safe to re-apply.
    Upsert { id: Bson, fields: BsonDocument },
    /// Insert a document without an identity; the store assigns one.
    Insert { fields: BsonDocument },
    Delete { id: Bson },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub index: usize,
    pub detail: String,
}

/// Aggregated result of one unordered batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub success: bool,
    pub inserted: u64,
    pub upserted: u64,
    pub modified: u64,
    pub deleted: u64,
    /// Inputs dropped before submission (e.g. identity-less deletes).
    pub skipped: u64,
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    /// The outcome of submitting nothing: success with zero effect.
    #[must_use]
    pub fn no_op() -> Self {
        Self { success: true, ..Self::default() }
    }

    /// Total documents this batch applied to the store.
    #[must_use]
    pub const fn applied(&self) -> u64 {
        self.inserted + self.upserted + self.modified + self.deleted
    }
}

/// Turns documents into write mutations: a document carrying an identity
/// becomes an upsert, one without becomes an insert.
#[must_use]
pub fn build_writes(docs: &[Document]) -> Vec<MutationOp> {
    docs.iter()
        .map(|d| match d.id() {
            Some(id) => MutationOp::Upsert { id: id.clone(), fields: d.data.clone() },
            None => MutationOp::Insert { fields: d.data.clone() },
        })
        .collect()
}

/// Turns documents into delete mutations. Documents without an identity
/// cannot be addressed and are skipped, not treated as an error; the count
/// of skipped inputs is returned alongside the ops.
#[must_use]
pub fn build_deletes(docs: &[Document]) -> (Vec<MutationOp>, u64) {
    let mut skipped = 0u64;
    let ops = docs
        .iter()
        .filter_map(|d| match d.id() {
            Some(id) => Some(MutationOp::Delete { id: id.clone() }),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();
    (ops, skipped)
}

/// Submits mutation batches in single unordered round trips.
///
/// Unordered means one failing operation never prevents the rest of the
/// batch from applying; per-operation failures come back in the outcome and
/// the caller decides what to do with them. Transient transport errors are
/// retried whole-batch; re-applying idempotent upserts is harmless.
pub struct BulkExecutor<'a, S: DocumentStore> {
    store: &'a S,
    retry: RetryPolicy,
}

impl<'a, S: DocumentStore> BulkExecutor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store, retry: RetryPolicy::default() }
    }

    pub fn with_retry(store: &'a S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn execute(&self, ops: &[MutationOp]) -> Result<BulkOutcome, StoreError> {
        if ops.is_empty() {
            return Ok(BulkOutcome::no_op());
        }
        let outcome = self.retry.run(async || self.store.bulk_apply(ops, false).await).await?;
        if outcome.success {
            log::info!(
                "bulk apply: upserted {} modified {} inserted {} deleted {} (total {} ops)",
                outcome.upserted,
                outcome.modified,
                outcome.inserted,
                outcome.deleted,
                ops.len()
            );
        } else {
            log::warn!(
                "bulk apply: {} of {} operations failed, first: {}",
                outcome.failures.len(),
                ops.len(),
                outcome.failures.first().map_or("", |f| f.detail.as_str())
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn writes_split_on_identity() {
        let docs = vec![
            Document::new(doc! { "_id": 1, "v": "a" }),
            Document::new(doc! { "v": "b" }),
        ];
        let ops = build_writes(&docs);
        assert!(matches!(&ops[0], MutationOp::Upsert { id, .. } if *id == Bson::Int32(1)));
        assert!(matches!(&ops[1], MutationOp::Insert { .. }));
    }

    #[test]
    fn deletes_skip_identity_less_documents() {
        let docs = vec![
            Document::new(doc! { "v": "a" }),
            Document::new(doc! { "_id": 2 }),
            Document::new(doc! { "v": "c" }),
        ];
        let (ops, skipped) = build_deletes(&docs);
        assert_eq!(ops.len(), 1);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn no_op_outcome_is_success() {
        let o = BulkOutcome::no_op();
        assert!(o.success);
        assert_eq!(o.applied(), 0);
        assert!(o.failures.is_empty());
    }
}
