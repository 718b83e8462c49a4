//! Store client abstraction.
//!
//! The mapper talks to a document store only through [`Store`] and
//! [`Collection`]. Every call blocks until the store answers. Errors raised
//! by an implementation are reported as [`OdmError::Store`](crate::OdmError)
//! and reach the caller unchanged.

use std::sync::Arc;

use bson::{Bson, Document};

use crate::error::OdmResult;

/// Rows produced by a find, in store order.
pub type DocumentStream = Box<dyn Iterator<Item = OdmResult<Document>> + Send>;

/// A connection to one database of a document store.
pub trait Store: Send + Sync {
    /// Get a handle to a named collection.
    fn collection(&self, name: &str) -> Arc<dyn Collection>;
}

/// Operations on one collection.
pub trait Collection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Run a query and stream the matching documents.
    fn find(&self, query: &FindQuery) -> OdmResult<DocumentStream>;

    /// Fetch the first matching document.
    fn find_one(&self, filter: Document, projection: Option<Document>)
    -> OdmResult<Option<Document>>;

    /// Atomically fetch and modify (or remove) the first matching document.
    fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: &ModifyOptions,
    ) -> OdmResult<Option<Document>>;

    /// Insert one document.
    fn insert_one(&self, document: Document) -> OdmResult<InsertOutcome>;

    /// Update the first matching document.
    fn update_one(&self, filter: Document, update: Document) -> OdmResult<UpdateOutcome>;

    /// Delete the first matching document.
    fn delete_one(&self, filter: Document) -> OdmResult<DeleteOutcome>;

    /// Count matching documents.
    fn count(&self, filter: Document) -> OdmResult<u64>;
}

/// A query waiting to be executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Filter document.
    pub filter: Document,
    /// Field projection.
    pub projection: Option<Document>,
    /// Sort specification.
    pub sort: Option<Document>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Create a query with a filter.
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Set the projection.
    pub fn with_projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection.filter(|p| !p.is_empty());
        self
    }

    /// Set the sort specification.
    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the number of documents to skip.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the maximum number of documents.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for [`Collection::find_and_modify`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyOptions {
    /// Which document to pick when several match.
    pub sort: Option<Document>,
    /// Insert a document when none matches.
    pub upsert: bool,
    /// Return the document after modification instead of before.
    pub return_new: bool,
    /// Remove the document instead of updating it.
    pub remove: bool,
}

impl ModifyOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sort specification.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Enable or disable upsert.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Return the modified document.
    pub fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = return_new;
        self
    }

    /// Remove the matched document.
    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }
}

/// Result of an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// Identifier the store assigned to the document.
    pub inserted_id: Bson,
}

/// Result of an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Documents matching the filter.
    pub matched_count: u64,
    /// Documents actually changed.
    pub modified_count: u64,
    /// Identifier of an upserted document.
    pub upserted_id: Option<Bson>,
}

/// Result of a delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOutcome {
    /// Documents removed.
    pub deleted_count: u64,
}
