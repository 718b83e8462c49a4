//! In-process document store.
//!
//! [`MemoryStore`] keeps collections as ordered vectors of documents and
//! understands the subset of the query language the mapper relies on:
//! equality, comparison, `$in`/`$nin`, `$exists`, `$and`/`$or`, projections,
//! multi-key sorts and the `$set`/`$unset`/`$inc` update operators.
//!
//! Every operation sent through a [`Collection`] handle is recorded, which
//! lets tests assert how many lookups a piece of code performed.

mod matcher;

pub use matcher::compare_bson;

use std::sync::Arc;

use bson::{Bson, Document, oid::ObjectId};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::trace;

use crate::error::{OdmError, OdmResult};
use crate::store::{
    Collection, DeleteOutcome, DocumentStream, FindQuery, InsertOutcome, ModifyOptions, Store,
    UpdateOutcome,
};

/// Errors raised by the in-memory store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryStoreError {
    /// The query or update used an operator the store does not evaluate.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// An operator received an operand of the wrong shape.
    #[error("invalid operand for {operator}: {reason}")]
    InvalidOperand {
        /// The operator.
        operator: String,
        /// What was wrong.
        reason: String,
    },
}

impl From<MemoryStoreError> for OdmError {
    fn from(err: MemoryStoreError) -> Self {
        OdmError::store(err)
    }
}

/// Kind of a recorded store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Cursor query.
    Find,
    /// Single-document fetch.
    FindOne,
    /// Atomic fetch-and-modify.
    FindAndModify,
    /// Insert.
    Insert,
    /// Update.
    Update,
    /// Delete.
    Delete,
    /// Count.
    Count,
}

/// A recorded store operation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOp {
    /// Target collection.
    pub collection: String,
    /// Operation kind.
    pub kind: OpKind,
    /// Filter sent with the operation; the document itself for inserts.
    pub filter: Document,
}

#[derive(Default)]
struct Inner {
    collections: RwLock<IndexMap<String, Vec<Document>>>,
    operations: Mutex<Vec<StoreOp>>,
}

/// Shared in-memory store. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a collection as given, without recording an
    /// operation or assigning identifiers.
    pub fn seed(&self, collection: &str, documents: impl IntoIterator<Item = Document>) {
        self.inner
            .collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    /// Snapshot of a collection's documents, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.inner
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Names of the collections holding data.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner.collections.read().keys().cloned().collect()
    }

    /// Every recorded operation, oldest first.
    pub fn operations(&self) -> Vec<StoreOp> {
        self.inner.operations.lock().clone()
    }

    /// Recorded operations of one kind.
    pub fn operations_of(&self, kind: OpKind) -> Vec<StoreOp> {
        self.inner
            .operations
            .lock()
            .iter()
            .filter(|op| op.kind == kind)
            .cloned()
            .collect()
    }

    /// Forget recorded operations.
    pub fn clear_operations(&self) {
        self.inner.operations.lock().clear();
    }
}

impl Store for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MemoryCollection {
            name: name.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Handle to one collection of a [`MemoryStore`].
pub struct MemoryCollection {
    name: String,
    inner: Arc<Inner>,
}

impl MemoryCollection {
    fn record(&self, kind: OpKind, filter: &Document) {
        trace!(collection = %self.name, ?kind, filter = %filter, "Memory store operation");
        self.inner.operations.lock().push(StoreOp {
            collection: self.name.clone(),
            kind,
            filter: filter.clone(),
        });
    }

    /// Positions of matching documents, in the requested order.
    fn select(
        documents: &[Document],
        filter: &Document,
        sort: Option<&Document>,
    ) -> Result<Vec<usize>, MemoryStoreError> {
        let mut positions = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if matcher::matches(document, filter)? {
                positions.push(index);
            }
        }

        if let Some(sort) = sort.filter(|s| !s.is_empty()) {
            let mut keyed: Vec<Document> = positions
                .iter()
                .map(|&i| {
                    let mut key = documents[i].clone();
                    key.insert("__position", i as i64);
                    key
                })
                .collect();
            matcher::sort_documents(&mut keyed, sort);
            positions = keyed
                .iter()
                .filter_map(|d| d.get_i64("__position").ok())
                .map(|i| i as usize)
                .collect();
        }
        Ok(positions)
    }
}

fn projected(document: &Document, projection: Option<&Document>) -> Document {
    match projection {
        Some(projection) if !projection.is_empty() => matcher::project(document, projection),
        _ => document.clone(),
    }
}

fn with_id(document: Document) -> (Document, Bson) {
    if let Some(id) = document.get("_id") {
        let id = id.clone();
        return (document, id);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut stored = Document::new();
    stored.insert("_id", id.clone());
    for (key, value) in document {
        stored.insert(key, value);
    }
    (stored, id)
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, query: &FindQuery) -> OdmResult<DocumentStream> {
        self.record(OpKind::Find, &query.filter);
        let collections = self.inner.collections.read();
        let documents = collections.get(&self.name).map(Vec::as_slice).unwrap_or(&[]);

        let positions = Self::select(documents, &query.filter, query.sort.as_ref())?;
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query
            .limit
            .filter(|&l| l > 0)
            .map_or(usize::MAX, |l| l as usize);

        let rows: Vec<OdmResult<Document>> = positions
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|i| Ok(projected(&documents[i], query.projection.as_ref())))
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> OdmResult<Option<Document>> {
        self.record(OpKind::FindOne, &filter);
        let collections = self.inner.collections.read();
        let documents = collections.get(&self.name).map(Vec::as_slice).unwrap_or(&[]);

        let positions = Self::select(documents, &filter, None)?;
        Ok(positions
            .first()
            .map(|&i| projected(&documents[i], projection.as_ref())))
    }

    fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: &ModifyOptions,
    ) -> OdmResult<Option<Document>> {
        self.record(OpKind::FindAndModify, &filter);
        let mut collections = self.inner.collections.write();
        let documents = collections.entry(self.name.clone()).or_default();

        let position = Self::select(documents, &filter, options.sort.as_ref())?
            .first()
            .copied();

        let Some(position) = position else {
            if !options.upsert || options.remove {
                return Ok(None);
            }
            let mut created = matcher::upsert_seed(&filter);
            matcher::apply_update(&mut created, &update)?;
            let (created, _) = with_id(created);
            documents.push(created.clone());
            return Ok(options
                .return_new
                .then(|| projected(&created, projection.as_ref())));
        };

        if options.remove {
            let removed = documents.remove(position);
            return Ok(Some(projected(&removed, projection.as_ref())));
        }

        let before = documents[position].clone();
        matcher::apply_update(&mut documents[position], &update)?;
        let result = if options.return_new {
            &documents[position]
        } else {
            &before
        };
        Ok(Some(projected(result, projection.as_ref())))
    }

    fn insert_one(&self, document: Document) -> OdmResult<InsertOutcome> {
        self.record(OpKind::Insert, &document);
        let (document, inserted_id) = with_id(document);
        self.inner
            .collections
            .write()
            .entry(self.name.clone())
            .or_default()
            .push(document);
        Ok(InsertOutcome { inserted_id })
    }

    fn update_one(&self, filter: Document, update: Document) -> OdmResult<UpdateOutcome> {
        self.record(OpKind::Update, &filter);
        let mut collections = self.inner.collections.write();
        let documents = collections.entry(self.name.clone()).or_default();

        let Some(&position) = Self::select(documents, &filter, None)?.first() else {
            return Ok(UpdateOutcome::default());
        };
        let changed = matcher::apply_update(&mut documents[position], &update)?;
        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(changed),
            upserted_id: None,
        })
    }

    fn delete_one(&self, filter: Document) -> OdmResult<DeleteOutcome> {
        self.record(OpKind::Delete, &filter);
        let mut collections = self.inner.collections.write();
        let Some(documents) = collections.get_mut(&self.name) else {
            return Ok(DeleteOutcome::default());
        };

        let Some(&position) = Self::select(documents, &filter, None)?.first() else {
            return Ok(DeleteOutcome::default());
        };
        documents.remove(position);
        Ok(DeleteOutcome { deleted_count: 1 })
    }

    fn count(&self, filter: Document) -> OdmResult<u64> {
        self.record(OpKind::Count, &filter);
        let collections = self.inner.collections.read();
        let documents = collections.get(&self.name).map(Vec::as_slice).unwrap_or(&[]);
        Ok(Self::select(documents, &filter, None)?.len() as u64)
    }
}
