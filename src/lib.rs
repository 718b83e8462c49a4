//! # docmap
//!
//! A lightweight object-document mapper for document stores.
//!
//! docmap provides:
//! - Models declared as marker types with collection and embedding metadata
//! - Lazy queries that fill raw documents into typed instances
//! - Batched joins: one `$in` lookup per join across a whole result set
//! - Instance persistence with optional timestamps
//! - A pagination hook and passthrough to the underlying collection
//! - A MongoDB store (feature `mongodb`, on by default) and an in-memory store
//!
//! ## Quick Start
//!
//! ```rust
//! use docmap::prelude::*;
//! use docmap::memory::MemoryStore;
//!
//! struct Task;
//!
//! impl Model for Task {
//!     const NAME: &'static str = "Task";
//!     const COLLECTION_NAME: Option<&'static str> = Some("tasks");
//!     const TIMESTAMPS: bool = true;
//! }
//!
//! let db = Database::single(MemoryStore::new());
//!
//! let mut task = Task::create(doc! { "title": "write docs", "done": false });
//! assert!(task.save(&db)?.is_insert());
//!
//! let found = Task::find_by_id(&db, task.id().unwrap())?.unwrap();
//! assert_eq!(found.get_str("title"), Some("write docs"));
//! # Ok::<(), docmap::OdmError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use docmap_core::*;

/// MongoDB store adapter.
#[cfg(feature = "mongodb")]
#[cfg_attr(docsrs, doc(cfg(feature = "mongodb")))]
pub mod mongodb {
    pub use docmap_mongodb::*;
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::bson::{Bson, Document, doc, oid::ObjectId};
    pub use docmap_core::prelude::*;

    #[cfg(feature = "mongodb")]
    pub use docmap_mongodb::{MongoClient, MongoConfig, MongoStore};
}
