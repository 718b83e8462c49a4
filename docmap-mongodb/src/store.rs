//! [`Store`] implementation over the blocking MongoDB driver.

use std::sync::Arc;

use bson::Document;
use docmap_core::{
    Collection, DeleteOutcome, DocumentStream, FindQuery, InsertOutcome, ModifyOptions, OdmError,
    OdmResult, Store, UpdateOutcome,
};
use mongodb::options::{
    FindOneAndDeleteOptions, FindOneAndReplaceOptions, FindOneAndUpdateOptions, FindOneOptions,
    FindOptions, ReturnDocument,
};
use tracing::debug;

use crate::client::MongoClient;
use crate::error::{MongoError, MongoResult};

/// A MongoDB database exposed as a document store.
///
/// ```rust,no_run
/// use docmap_core::Database;
/// use docmap_mongodb::{MongoClient, MongoStore};
///
/// let client = MongoClient::builder()
///     .uri("mongodb://localhost:27017")
///     .database("shop")
///     .build()?;
/// let db = Database::single(MongoStore::new(client));
/// # Ok::<(), docmap_mongodb::MongoError>(())
/// ```
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
}

impl MongoStore {
    /// Wrap a client.
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    /// Connect using `DOCMAP_MONGODB_*` environment variables.
    pub fn from_env() -> MongoResult<Self> {
        Ok(Self::new(MongoClient::from_env()?))
    }

    /// The wrapped client.
    pub fn client(&self) -> &MongoClient {
        &self.client
    }
}

impl Store for MongoStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MongoCollection {
            name: name.to_string(),
            inner: self.client.collection_doc(name),
        })
    }
}

/// One MongoDB collection of raw documents.
pub struct MongoCollection {
    name: String,
    inner: mongodb::sync::Collection<Document>,
}

impl MongoCollection {
    /// The driver collection handle.
    pub fn inner(&self) -> &mongodb::sync::Collection<Document> {
        &self.inner
    }
}

fn driver_error(err: mongodb::error::Error) -> OdmError {
    MongoError::from(err).into()
}

/// An update made of operators (`$set`, ...) rather than a replacement.
fn is_update_document(update: &Document) -> bool {
    update.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn find_options(query: &FindQuery) -> OdmResult<FindOptions> {
    let mut options = FindOptions::default();
    options.projection = query.projection.clone();
    options.sort = query.sort.clone();
    options.skip = query.skip;
    options.limit = query
        .limit
        .map(i64::try_from)
        .transpose()
        .map_err(|_| OdmError::config("limit out of range"))?;
    Ok(options)
}

impl Collection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, query: &FindQuery) -> OdmResult<DocumentStream> {
        debug!(collection = %self.name, filter = %query.filter, "Executing find");
        let options = find_options(query)?;
        let cursor = self
            .inner
            .find(query.filter.clone(), options)
            .map_err(driver_error)?;
        Ok(Box::new(cursor.map(|row| row.map_err(driver_error))))
    }

    fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> OdmResult<Option<Document>> {
        debug!(collection = %self.name, filter = %filter, "Executing find_one");
        let mut options = FindOneOptions::default();
        options.projection = projection;
        self.inner.find_one(filter, options).map_err(driver_error)
    }

    fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: &ModifyOptions,
    ) -> OdmResult<Option<Document>> {
        debug!(
            collection = %self.name,
            filter = %filter,
            remove = options.remove,
            upsert = options.upsert,
            "Executing find_and_modify"
        );
        let return_document = if options.return_new {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        };

        if options.remove {
            let mut delete = FindOneAndDeleteOptions::default();
            delete.projection = projection;
            delete.sort = options.sort.clone();
            return self
                .inner
                .find_one_and_delete(filter, delete)
                .map_err(driver_error);
        }

        if is_update_document(&update) {
            let mut modify = FindOneAndUpdateOptions::default();
            modify.projection = projection;
            modify.sort = options.sort.clone();
            modify.upsert = Some(options.upsert);
            modify.return_document = Some(return_document);
            self.inner
                .find_one_and_update(filter, update, modify)
                .map_err(driver_error)
        } else {
            let mut replace = FindOneAndReplaceOptions::default();
            replace.projection = projection;
            replace.sort = options.sort.clone();
            replace.upsert = Some(options.upsert);
            replace.return_document = Some(return_document);
            self.inner
                .find_one_and_replace(filter, update, replace)
                .map_err(driver_error)
        }
    }

    fn insert_one(&self, document: Document) -> OdmResult<InsertOutcome> {
        debug!(collection = %self.name, "Executing insert_one");
        let result = self.inner.insert_one(document, None).map_err(driver_error)?;
        Ok(InsertOutcome {
            inserted_id: result.inserted_id,
        })
    }

    fn update_one(&self, filter: Document, update: Document) -> OdmResult<UpdateOutcome> {
        debug!(collection = %self.name, filter = %filter, "Executing update_one");
        let result = self
            .inner
            .update_one(filter, update, None)
            .map_err(driver_error)?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    fn delete_one(&self, filter: Document) -> OdmResult<DeleteOutcome> {
        debug!(collection = %self.name, filter = %filter, "Executing delete_one");
        let result = self.inner.delete_one(filter, None).map_err(driver_error)?;
        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }

    fn count(&self, filter: Document) -> OdmResult<u64> {
        debug!(collection = %self.name, filter = %filter, "Executing count");
        self.inner
            .count_documents(filter, None)
            .map_err(driver_error)
    }
}
