//! Query coordinator bound to one model.
//!
//! ```rust
//! use bson::doc;
//! use docmap_core::{Database, Mapper, Model};
//! use docmap_core::memory::MemoryStore;
//!
//! struct Post;
//!
//! impl Model for Post {
//!     const NAME: &'static str = "Post";
//!     const COLLECTION_NAME: Option<&'static str> = Some("posts");
//! }
//!
//! let store = MemoryStore::new();
//! store.seed("posts", vec![doc! { "title": "b" }, doc! { "title": "a" }]);
//! let db = Database::single(store);
//!
//! let mut mapper = Mapper::<Post>::new(&db)?;
//! let posts = mapper.find(doc! {}, None)?.sort(doc! { "title": 1 })?.get()?;
//! assert_eq!(posts[0].get_str("title"), Some("a"));
//! # Ok::<(), docmap_core::OdmError>(())
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::{Document, doc};
use tracing::debug;

use crate::cursor::Cursor;
use crate::database::Database;
use crate::error::{OdmError, OdmResult};
use crate::join::{JoinSpec, Joinable, resolve_joins};
use crate::model::{Entity, Model};
use crate::pagination::{NoPaginator, PageData, Paginate};
use crate::store::{
    Collection, DeleteOutcome, FindQuery, InsertOutcome, ModifyOptions, UpdateOutcome,
};
use crate::value::IntoObjectId;

/// Fetches documents of model `M` and fills them into entities.
///
/// A mapper is request scoped: `find` installs a cursor that `get` drains
/// once. Joins registered with [`Mapper::join`] run only when asked for.
pub struct Mapper<M: Model, P = NoPaginator> {
    database: Database,
    cursor: Option<Cursor>,
    joins: Vec<JoinSpec>,
    paginator: P,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Mapper<M> {
    /// Create a mapper; fails when the registry holds no connection.
    pub fn new(database: &Database) -> OdmResult<Self> {
        database.ensure_configured()?;
        Ok(Self {
            database: database.clone(),
            cursor: None,
            joins: Vec::new(),
            paginator: NoPaginator,
            _model: PhantomData,
        })
    }
}

impl<M: Model, P> Mapper<M, P> {
    /// Replace the pagination hook.
    pub fn with_paginator<Q: Paginate<M>>(self, paginator: Q) -> Mapper<M, Q> {
        Mapper {
            database: self.database,
            cursor: self.cursor,
            joins: self.joins,
            paginator,
            _model: PhantomData,
        }
    }

    /// The registry this mapper reads from.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Name of the bound collection.
    pub fn collection_name(&self) -> OdmResult<String> {
        self.database.collection_name(&M::model_type())
    }

    /// Handle to the bound collection, for operations the mapper does not wrap.
    pub fn collection(&self) -> OdmResult<Arc<dyn Collection>> {
        self.database.collection(&M::model_type())
    }

    /// Start a query. Results are read with [`Mapper::get`].
    pub fn find(&mut self, filter: Document, projection: Option<Document>) -> OdmResult<&mut Self> {
        let collection = self.collection()?;
        let query = FindQuery::new(filter).with_projection(projection);
        self.cursor = Some(Cursor::new(collection, query));
        Ok(self)
    }

    /// Fetch the first matching document.
    pub fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> OdmResult<Option<Entity<M>>> {
        let collection = self.collection()?;
        debug!(collection = %collection.name(), filter = %filter, "Executing find_one");
        let row = collection.find_one(filter, projection.filter(|p| !p.is_empty()))?;
        Ok(row.map(Entity::fill))
    }

    /// Fetch a document by identifier.
    pub fn find_by_id(&self, id: impl IntoObjectId) -> OdmResult<Option<Entity<M>>> {
        let oid = id.into_object_id()?;
        self.find_one(doc! { "_id": oid }, None)
    }

    /// Atomically modify the first matching document and fill the result.
    pub fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: &ModifyOptions,
    ) -> OdmResult<Option<Entity<M>>> {
        let collection = self.collection()?;
        debug!(collection = %collection.name(), filter = %filter, "Executing find_and_modify");
        let row = collection.find_and_modify(
            filter,
            update,
            projection.filter(|p| !p.is_empty()),
            options,
        )?;
        Ok(row.map(Entity::fill))
    }

    /// Sort the active cursor.
    pub fn sort(&mut self, sort: Document) -> OdmResult<&mut Self> {
        self.cursor_mut()?.sort(sort)?;
        Ok(self)
    }

    /// Limit the active cursor.
    pub fn limit(&mut self, limit: u64) -> OdmResult<&mut Self> {
        self.cursor_mut()?.limit(limit)?;
        Ok(self)
    }

    /// Skip results of the active cursor.
    pub fn skip(&mut self, skip: u64) -> OdmResult<&mut Self> {
        self.cursor_mut()?.skip(skip)?;
        Ok(self)
    }

    /// Register a join against model `T`.
    ///
    /// The ObjectId found at `source` is replaced by the related record in
    /// `dest` (or `source` itself) once [`Mapper::resolve_joins`] runs.
    pub fn join<T: Model>(
        &mut self,
        source: &str,
        dest: Option<&str>,
        projection: Option<Document>,
    ) -> &mut Self {
        self.joins.push(JoinSpec::new::<T>(source, dest, projection));
        self
    }

    /// Registered joins, in registration order.
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    /// Drain the active cursor into entities, in store order.
    ///
    /// A drained cursor yields nothing, so a second call returns an empty
    /// vector. Joins are not applied.
    pub fn get(&mut self) -> OdmResult<Vec<Entity<M>>> {
        self.cursor_mut()?
            .by_ref()
            .map(|row| row.map(Entity::fill))
            .collect()
    }

    /// Drain the active cursor into raw documents.
    pub fn get_raw(&mut self) -> OdmResult<Vec<Document>> {
        self.cursor_mut()?.by_ref().collect()
    }

    /// Drain the active cursor and resolve registered joins.
    pub fn get_joined(&mut self) -> OdmResult<Vec<Entity<M>>> {
        let mut results = self.get()?;
        self.resolve_joins(&mut results)?;
        Ok(results)
    }

    /// Resolve registered joins over materialized rows.
    ///
    /// One lookup per join, whatever the number of rows. Rows whose
    /// reference is missing, not an ObjectId, or not found are left as is.
    pub fn resolve_joins<J: Joinable>(&self, items: &mut [J]) -> OdmResult<()> {
        resolve_joins(&self.database, &self.joins, items)
    }

    /// The active cursor, if `find` was called.
    pub fn get_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Count matching documents in the bound collection.
    pub fn count(&self, filter: Document) -> OdmResult<u64> {
        self.collection()?.count(filter)
    }

    /// Insert a raw document into the bound collection.
    pub fn insert_one(&self, document: Document) -> OdmResult<InsertOutcome> {
        self.collection()?.insert_one(document)
    }

    /// Update the first matching document in the bound collection.
    pub fn update_one(&self, filter: Document, update: Document) -> OdmResult<UpdateOutcome> {
        self.collection()?.update_one(filter, update)
    }

    /// Delete the first matching document in the bound collection.
    pub fn delete_one(&self, filter: Document) -> OdmResult<DeleteOutcome> {
        self.collection()?.delete_one(filter)
    }

    fn cursor_mut(&mut self) -> OdmResult<&mut Cursor> {
        self.cursor.as_mut().ok_or(OdmError::NoCursor)
    }
}

impl<M: Model, P> fmt::Debug for Mapper<M, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("model", &M::NAME)
            .field("cursor", &self.cursor)
            .field("joins", &self.joins.len())
            .finish()
    }
}

impl<M: Model, P: Paginate<M>> Mapper<M, P> {
    /// Read one page of the active cursor and hand it to the paginator.
    ///
    /// The total is counted before the cursor is sliced to
    /// `skip = (page - 1) * per_page`, `limit = per_page`.
    pub fn get_paginator(
        &mut self,
        per_page: u64,
        page: u64,
        options: Option<Document>,
    ) -> OdmResult<P::Output> {
        let skip = page
            .saturating_sub(1)
            .checked_mul(per_page)
            .ok_or_else(|| {
                OdmError::config(format!(
                    "page {} of {} per page is out of range",
                    page, per_page
                ))
            })?;

        let cursor = self.cursor_mut()?;
        let total = cursor.count_documents()?;
        cursor.skip(skip)?.limit(per_page)?;
        let results = self.get()?;

        self.paginator.create_paginator(PageData {
            results,
            total,
            per_page,
            page,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, OpKind};
    use crate::model::Untyped;

    struct Post;

    impl Model for Post {
        const NAME: &'static str = "Post";
        const COLLECTION_NAME: Option<&'static str> = Some("posts");
    }

    fn database() -> (MemoryStore, Database) {
        let store = MemoryStore::new();
        store.seed(
            "posts",
            (1..=5).map(|n| doc! { "n": n, "title": format!("post {}", n) }),
        );
        let db = Database::single(store.clone());
        (store, db)
    }

    #[test]
    fn test_new_requires_database() {
        let err = Mapper::<Post>::new(&Database::new()).err().unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_cursor_operations_need_find() {
        let (_, db) = database();
        let mut mapper = Mapper::<Post>::new(&db).unwrap();

        assert!(mapper.get().unwrap_err().is_no_cursor());
        assert!(mapper.get_raw().unwrap_err().is_no_cursor());
        assert!(mapper.sort(doc! { "n": 1 }).err().unwrap().is_no_cursor());
        assert!(mapper.limit(1).err().unwrap().is_no_cursor());
        assert!(mapper.skip(1).err().unwrap().is_no_cursor());
        assert!(mapper.get_paginator(10, 1, None).unwrap_err().is_no_cursor());
        assert!(mapper.get_cursor().is_none());
    }

    #[test]
    fn test_find_is_lazy() {
        let (store, db) = database();
        let mut mapper = Mapper::<Post>::new(&db).unwrap();
        mapper.find(doc! {}, None).unwrap();

        assert!(mapper.get_cursor().is_some());
        assert!(store.operations().is_empty());
    }

    #[test]
    fn test_find_without_collection_name() {
        let (_, db) = database();
        let mut mapper = Mapper::<Untyped>::new(&db).unwrap();
        assert!(mapper.find(doc! {}, None).err().unwrap().is_config_error());
    }

    #[test]
    fn test_get_drains_once() {
        let (_, db) = database();
        let mut mapper = Mapper::<Post>::new(&db).unwrap();
        let first = mapper.find(doc! {}, None).unwrap().get().unwrap();
        assert_eq!(first.len(), 5);
        assert!(mapper.get().unwrap().is_empty());
    }

    #[test]
    fn test_get_raw() {
        let (_, db) = database();
        let mut mapper = Mapper::<Post>::new(&db).unwrap();
        let rows = mapper
            .find(doc! { "n": 2 }, Some(doc! { "title": 1, "_id": 0 }))
            .unwrap()
            .get_raw()
            .unwrap();
        assert_eq!(rows, vec![doc! { "title": "post 2" }]);
    }

    #[test]
    fn test_get_paginator_default_fails() {
        let (_, db) = database();
        let mut mapper = Mapper::<Post>::new(&db).unwrap();
        mapper.find(doc! {}, None).unwrap();
        assert!(mapper.get_paginator(2, 1, None).unwrap_err().is_config_error());
    }

    #[test]
    fn test_get_paginator_slices_after_counting() {
        let (store, db) = database();
        let mut mapper = Mapper::<Post>::new(&db)
            .unwrap()
            .with_paginator(|page: PageData<Post>| {
                let ns: Vec<i32> = page.results.iter().filter_map(|p| p.get_i32("n")).collect();
                (page.total, page.per_page, page.page, ns)
            });

        mapper.find(doc! {}, None).unwrap().sort(doc! { "n": 1 }).unwrap();
        let (total, per_page, page, ns) = mapper.get_paginator(2, 2, None).unwrap();

        assert_eq!(total, 5);
        assert_eq!(per_page, 2);
        assert_eq!(page, 2);
        assert_eq!(ns, vec![3, 4]);
        assert_eq!(store.operations_of(OpKind::Count).len(), 1);
    }

    #[test]
    fn test_get_paginator_rejects_out_of_range_page() {
        let (store, db) = database();
        let mut mapper = Mapper::<Post>::new(&db)
            .unwrap()
            .with_paginator(|page: PageData<Post>| page.results.len());
        mapper.find(doc! {}, None).unwrap();

        let err = mapper.get_paginator(u64::MAX / 2, 4, None).unwrap_err();
        assert!(err.is_config_error());
        assert!(store.operations().is_empty());
    }

    #[test]
    fn test_get_paginator_page_zero_is_first_page() {
        let (_, db) = database();
        let mut mapper = Mapper::<Post>::new(&db)
            .unwrap()
            .with_paginator(|page: PageData<Post>| page.results.len());
        mapper.find(doc! {}, None).unwrap();
        assert_eq!(mapper.get_paginator(2, 0, None).unwrap(), 2);
    }

    #[test]
    fn test_reshaping_after_get_fails() {
        let (_, db) = database();
        let mut mapper = Mapper::<Post>::new(&db).unwrap();
        mapper.find(doc! {}, None).unwrap().get().unwrap();
        assert!(mapper.limit(1).err().unwrap().is_config_error());
    }

    #[test]
    fn test_passthrough() {
        let (store, db) = database();
        let mapper = Mapper::<Post>::new(&db).unwrap();

        assert_eq!(mapper.count(doc! {}).unwrap(), 5);
        mapper.insert_one(doc! { "n": 6 }).unwrap();
        mapper
            .update_one(doc! { "n": 6 }, doc! { "$set": { "title": "post 6" } })
            .unwrap();
        assert_eq!(mapper.count(doc! { "title": "post 6" }).unwrap(), 1);
        assert_eq!(mapper.delete_one(doc! { "n": 6 }).unwrap().deleted_count, 1);
        assert_eq!(store.documents("posts").len(), 5);
    }
}
