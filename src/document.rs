use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

/// Reserved identity field. Pagination orders and resumes by this key.
pub const ID_FIELD: &str = "_id";

/// A document is a BSON object with an optional `_id` identity.
///
/// Identity uniqueness within a collection is an invariant of the backing
/// store; this layer relies on it but does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub data: BsonDocument,
}

impl Document {
    #[must_use]
    pub const fn new(data: BsonDocument) -> Self {
        Self { data }
    }

    /// The identity value, if the document carries one.
    #[must_use]
    pub fn id(&self) -> Option<&Bson> {
        self.data.get(ID_FIELD)
    }

    #[must_use]
    pub fn has_id(&self) -> bool {
        self.data.contains_key(ID_FIELD)
    }
}

impl From<BsonDocument> for Document {
    fn from(data: BsonDocument) -> Self {
        Self::new(data)
    }
}
