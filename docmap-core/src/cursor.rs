//! Lazy, single-pass result cursor.

use std::fmt;
use std::sync::Arc;

use bson::Document;
use tracing::debug;

use crate::error::{OdmError, OdmResult};
use crate::store::{Collection, DocumentStream, FindQuery};

/// A query bound to a collection, executed on first read.
///
/// `sort`, `skip` and `limit` shape the query until iteration starts. Once
/// drained the cursor stays empty; it cannot be restarted.
pub struct Cursor {
    collection: Arc<dyn Collection>,
    query: FindQuery,
    stream: Option<DocumentStream>,
    exhausted: bool,
}

impl Cursor {
    /// Create a cursor for `query` on `collection`.
    pub fn new(collection: Arc<dyn Collection>, query: FindQuery) -> Self {
        Self {
            collection,
            query,
            stream: None,
            exhausted: false,
        }
    }

    /// The query this cursor runs.
    pub fn query(&self) -> &FindQuery {
        &self.query
    }

    /// Name of the collection being read.
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Set the sort specification.
    pub fn sort(&mut self, sort: Document) -> OdmResult<&mut Self> {
        self.ensure_not_started("sort")?;
        self.query.sort = Some(sort);
        Ok(self)
    }

    /// Limit the number of results.
    pub fn limit(&mut self, limit: u64) -> OdmResult<&mut Self> {
        self.ensure_not_started("limit")?;
        self.query.limit = Some(limit);
        Ok(self)
    }

    /// Skip results.
    pub fn skip(&mut self, skip: u64) -> OdmResult<&mut Self> {
        self.ensure_not_started("skip")?;
        self.query.skip = Some(skip);
        Ok(self)
    }

    /// Count all documents matching the filter, ignoring skip and limit.
    pub fn count_documents(&self) -> OdmResult<u64> {
        self.collection.count(self.query.filter.clone())
    }

    fn ensure_not_started(&self, operation: &str) -> OdmResult<()> {
        if self.is_started() {
            return Err(OdmError::config(format!(
                "cannot {} a cursor after iteration has started",
                operation
            )));
        }
        Ok(())
    }

    /// Check whether the query was sent to the store.
    pub fn is_started(&self) -> bool {
        self.stream.is_some() || self.exhausted
    }

    /// Check whether every result was read.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl Iterator for Cursor {
    type Item = OdmResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        if self.stream.is_none() {
            debug!(
                collection = %self.collection.name(),
                filter = %self.query.filter,
                "Executing find"
            );
            match self.collection.find(&self.query) {
                Ok(stream) => self.stream = Some(stream),
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }

        let next = self.stream.as_mut().and_then(Iterator::next);
        if next.is_none() {
            self.exhausted = true;
            self.stream = None;
        }
        next
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("collection", &self.collection.name())
            .field("query", &self.query)
            .field("started", &self.is_started())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
