use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bson::{Bson, Document as BsonDocument, oid::ObjectId};
use parking_lot::RwLock;

use crate::document::{Document, ID_FIELD};
use crate::errors::StoreError;
use crate::mutation::{BulkFailure, BulkOutcome, MutationOp};
use crate::query::{Filter, FindOptions, compare_bson, compare_docs, eval_filter, project_fields};
use crate::store::DocumentStore;

/// Identity key with the total BSON ordering, so the collection map itself
/// is the identity index.
#[derive(Debug, Clone)]
struct IdKey(Bson);

impl PartialEq for IdKey {
    fn eq(&self, other: &Self) -> bool {
        compare_bson(&self.0, &other.0) == Ordering::Equal
    }
}
impl Eq for IdKey {}
impl PartialOrd for IdKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for IdKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_bson(&self.0, &other.0)
    }
}

/// In-memory document store: named collections behind a lock, handed out as
/// cheaply cloneable handles.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, creating it on first access.
    pub fn collection(&self, name: &str) -> MemoryCollection {
        let mut cols = self.collections.write();
        cols.entry(name.to_string())
            .or_insert_with(|| MemoryCollection::new(name.to_string()))
            .clone()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }
}

/// A single in-memory collection. Clones share the same underlying map.
#[derive(Clone)]
pub struct MemoryCollection {
    name: String,
    docs: Arc<RwLock<BTreeMap<IdKey, BsonDocument>>>,
}

impl MemoryCollection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self { name, docs: Arc::new(RwLock::new(BTreeMap::new())) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Direct lookup by identity, bypassing the query path.
    #[must_use]
    pub fn get(&self, id: &Bson) -> Option<Document> {
        self.docs.read().get(&IdKey(id.clone())).cloned().map(Document::new)
    }

    fn apply_one(
        map: &mut BTreeMap<IdKey, BsonDocument>,
        op: &MutationOp,
        outcome: &mut BulkOutcome,
        index: usize,
    ) {
        match op {
            MutationOp::Upsert { id, fields } => {
                let mut fields = fields.clone();
                if !fields.contains_key(ID_FIELD) {
                    fields.insert(ID_FIELD.to_string(), id.clone());
                }
                match map.get_mut(&IdKey(id.clone())) {
                    Some(existing) => {
                        // replace-all-on-match; an identical re-application
                        // leaves the modified counter untouched
                        if *existing != fields {
                            *existing = fields;
                            outcome.modified += 1;
                        }
                    }
                    None => {
                        map.insert(IdKey(id.clone()), fields);
                        outcome.upserted += 1;
                    }
                }
            }
            MutationOp::Insert { fields } => {
                let mut fields = fields.clone();
                let id = match fields.get(ID_FIELD) {
                    Some(id) => id.clone(),
                    None => {
                        let id = Bson::ObjectId(ObjectId::new());
                        fields.insert(ID_FIELD.to_string(), id.clone());
                        id
                    }
                };
                if map.contains_key(&IdKey(id.clone())) {
                    outcome.failures.push(BulkFailure {
                        index,
                        detail: format!("duplicate identity: {id}"),
                    });
                } else {
                    map.insert(IdKey(id), fields);
                    outcome.inserted += 1;
                }
            }
            MutationOp::Delete { id } => {
                if map.remove(&IdKey(id.clone())).is_some() {
                    outcome.deleted += 1;
                }
            }
        }
    }
}

impl DocumentStore for MemoryCollection {
    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let map = self.docs.read();
        let mut docs: Vec<BsonDocument> =
            map.values().filter(|d| eval_filter(d, filter)).cloned().collect();
        drop(map);

        // the map iterates in identity order; an explicit sort spec overrides
        if let Some(sort) = &opts.sort {
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }

        let skip = opts.skip.unwrap_or(0);
        let limit = opts.limit.unwrap_or(usize::MAX);
        let end = skip.saturating_add(limit).min(docs.len());
        let mut docs = if skip >= docs.len() { Vec::new() } else { docs[skip..end].to_vec() };

        if let Some(fields) = &opts.projection {
            for d in &mut docs {
                *d = project_fields(d, fields);
            }
        }
        Ok(docs.into_iter().map(Document::new).collect())
    }

    async fn bulk_apply(&self, ops: &[MutationOp], ordered: bool) -> Result<BulkOutcome, StoreError> {
        let mut outcome = BulkOutcome::default();
        let mut map = self.docs.write();
        for (index, op) in ops.iter().enumerate() {
            Self::apply_one(&mut map, op, &mut outcome, index);
            if ordered && !outcome.failures.is_empty() {
                break;
            }
        }
        outcome.success = outcome.failures.is_empty();
        Ok(outcome)
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let map = self.docs.read();
        Ok(map.values().filter(|d| eval_filter(d, filter)).count() as u64)
    }

    async fn estimated_count(&self) -> Result<u64, StoreError> {
        Ok(self.docs.read().len() as u64)
    }
}
