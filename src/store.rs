mod memory;

pub use memory::{MemoryCollection, MemoryStore};

use crate::document::Document;
use crate::errors::StoreError;
use crate::mutation::{BulkOutcome, MutationOp};
use crate::query::{Filter, FindOptions};

/// One collection of a document store, as this layer consumes it.
///
/// Every method is a self-contained round trip; `find` returns a batch
/// bounded by `opts.limit`, so no server-side cursor outlives the call.
/// Connection establishment, authentication and index administration belong
/// to the implementor, not to this seam.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Server-side filtered, sorted, bounded fetch.
    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, StoreError>;

    /// Applies a batch of mutations in one round trip. With `ordered` set
    /// to false, one operation's failure must not prevent the others from
    /// applying.
    async fn bulk_apply(&self, ops: &[MutationOp], ordered: bool) -> Result<BulkOutcome, StoreError>;

    /// Exact count of documents matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Fast approximate total count; may be momentarily stale after bulk
    /// mutations.
    async fn estimated_count(&self) -> Result<u64, StoreError>;
}
