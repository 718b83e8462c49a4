//! # docmap-core
//!
//! Document mapping for document stores.
//!
//! This crate provides:
//! - Models as marker types with collection, connection and embedding metadata
//! - Records that fill nested documents into their declared models
//! - A [`Mapper`] that runs lazy queries and hands back typed instances
//! - Batched join resolution: one `$in` lookup per join, whatever the row count
//! - A pagination hook and passthrough to the underlying collection
//! - A synchronous [`Store`] abstraction plus an in-memory implementation
//!
//! ## Example
//!
//! ```rust
//! use bson::{doc, oid::ObjectId};
//! use docmap_core::prelude::*;
//! use docmap_core::memory::MemoryStore;
//!
//! struct Author;
//! impl Model for Author {
//!     const NAME: &'static str = "Author";
//!     const COLLECTION_NAME: Option<&'static str> = Some("authors");
//! }
//!
//! struct Book;
//! impl Model for Book {
//!     const NAME: &'static str = "Book";
//!     const COLLECTION_NAME: Option<&'static str> = Some("books");
//! }
//!
//! let author_id = ObjectId::new();
//! let store = MemoryStore::new();
//! store.seed("authors", vec![doc! { "_id": author_id, "name": "Ursula" }]);
//! store.seed("books", vec![doc! { "title": "Lathe", "author": author_id }]);
//! let db = Database::single(store);
//!
//! let mut books = Book::find(&db, doc! {}, None)?;
//! books.join::<Author>("author", None, None);
//! let books = books.get_joined()?;
//!
//! let author = books[0].object("author").unwrap();
//! assert_eq!(author.get_str("name"), Some("Ursula"));
//! # Ok::<(), OdmError>(())
//! ```

pub mod cursor;
pub mod database;
pub mod env;
pub mod error;
pub mod join;
pub mod logging;
pub mod mapper;
pub mod memory;
pub mod model;
pub mod pagination;
pub mod record;
pub mod store;
pub mod value;

/// The BSON crate used in every public signature.
pub use bson;

pub use cursor::Cursor;
pub use database::Database;
pub use error::{OdmError, OdmResult};
pub use join::{JoinSpec, Joinable, resolve_joins};
pub use mapper::Mapper;
pub use model::{CREATED_AT, Entity, Model, ModelType, SaveOutcome, UPDATED_AT, Untyped};
pub use pagination::{NoPaginator, PageData, Paginate};
pub use record::{ID_FIELD, Record, STRING_ID_FIELD};
pub use store::{
    Collection, DeleteOutcome, DocumentStream, FindQuery, InsertOutcome, ModifyOptions, Store,
    UpdateOutcome,
};
pub use value::{IntoObjectId, Value};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::database::Database;
    pub use crate::error::{OdmError, OdmResult};
    pub use crate::join::{JoinSpec, Joinable};
    pub use crate::mapper::Mapper;
    pub use crate::model::{Entity, Model, ModelType, SaveOutcome};
    pub use crate::pagination::{NoPaginator, PageData, Paginate};
    pub use crate::record::Record;
    pub use crate::store::{Collection, ModifyOptions, Store};
    pub use crate::value::{IntoObjectId, Value};
}
