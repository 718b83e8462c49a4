//! # docmap-mongodb
//!
//! MongoDB store adapter for docmap.
//!
//! This crate provides:
//! - [`MongoStore`], a `docmap_core::Store` over the driver's blocking API
//! - Connection configuration from code or `DOCMAP_MONGODB_*` variables
//!
//! ## Example
//!
//! ```rust,no_run
//! use bson::doc;
//! use docmap_core::{Database, Model};
//! use docmap_mongodb::MongoStore;
//!
//! struct User;
//!
//! impl Model for User {
//!     const NAME: &'static str = "User";
//!     const COLLECTION_NAME: Option<&'static str> = Some("users");
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::single(MongoStore::from_env()?);
//!
//!     let mut users = User::find(&db, doc! { "active": true }, None)?;
//!     for user in users.limit(10)?.get()? {
//!         println!("{:?}", user.get_str("name"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod store;

pub use bson::oid::ObjectId;
pub use bson::{Bson, Document, doc};
pub use client::{MongoClient, MongoClientBuilder};
pub use config::{MongoConfig, MongoConfigBuilder, ReadPreference, WriteConcern};
pub use error::{MongoError, MongoResult};
pub use store::{MongoCollection, MongoStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{MongoClient, MongoClientBuilder};
    pub use crate::config::{MongoConfig, MongoConfigBuilder};
    pub use crate::error::{MongoError, MongoResult};
    pub use crate::store::MongoStore;
    pub use bson::oid::ObjectId;
    pub use bson::{Bson, Document, doc};
}
