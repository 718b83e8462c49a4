//! Blocking MongoDB client wrapper with built-in connection pooling.

use std::sync::Arc;
use std::time::Duration;

use bson::Document;
use mongodb::sync::{Client, Collection, Database};
use tracing::info;

use crate::config::MongoConfig;
use crate::error::{MongoError, MongoResult};
use crate::store::MongoStore;

/// A MongoDB client bound to one database.
///
/// The driver pools connections internally; clones share the pool.
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    database: Database,
    config: Arc<MongoConfig>,
}

impl MongoClient {
    /// Create a new client from configuration.
    ///
    /// No connection is opened until the first operation.
    pub fn new(config: MongoConfig) -> MongoResult<Self> {
        let uri = config.to_connection_string()?;
        let client = Client::with_uri_str(&uri)
            .map_err(|e| MongoError::connection(format!("failed to create client: {}", e)))?;
        let database = client.database(&config.database);

        info!(
            uri = %config.uri,
            database = %config.database,
            "MongoDB client created"
        );

        Ok(Self {
            client,
            database,
            config: Arc::new(config),
        })
    }

    /// Create a client from `DOCMAP_MONGODB_*` environment variables.
    pub fn from_env() -> MongoResult<Self> {
        Self::new(MongoConfig::from_env()?)
    }

    /// Create a builder for the client.
    pub fn builder() -> MongoClientBuilder {
        MongoClientBuilder::new()
    }

    /// Get a collection of raw documents.
    pub fn collection_doc(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Get the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the underlying MongoDB client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Wrap this client as a store for a `docmap_core::Database` registry.
    pub fn into_store(self) -> MongoStore {
        MongoStore::new(self)
    }
}

/// Builder for [`MongoClient`].
#[derive(Debug, Default)]
pub struct MongoClientBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    max_pool_size: Option<u32>,
    min_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
    direct_connection: Option<bool>,
}

impl MongoClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the MongoDB URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the minimum pool size.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Enable direct connection (bypass replica set discovery).
    pub fn direct_connection(mut self, enabled: bool) -> Self {
        self.direct_connection = Some(enabled);
        self
    }

    /// Resolve the configuration without creating a client.
    pub fn config(self) -> MongoResult<MongoConfig> {
        let mut builder = MongoConfig::builder();

        if let Some(uri) = self.uri {
            builder = builder.uri(uri);
        }
        if let Some(database) = self.database {
            builder = builder.database(database);
        }
        if let Some(app_name) = self.app_name {
            builder = builder.app_name(app_name);
        }
        if let Some(max_pool) = self.max_pool_size {
            builder = builder.max_pool_size(max_pool);
        }
        if let Some(min_pool) = self.min_pool_size {
            builder = builder.min_pool_size(min_pool);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(direct) = self.direct_connection {
            builder = builder.direct_connection(direct);
        }

        builder.build()
    }

    /// Build the client.
    pub fn build(self) -> MongoResult<MongoClient> {
        MongoClient::new(self.config()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let builder = MongoClientBuilder::new()
            .uri("mongodb://localhost:27017")
            .database("test")
            .max_pool_size(20);

        assert_eq!(builder.uri, Some("mongodb://localhost:27017".to_string()));
        assert_eq!(builder.database, Some("test".to_string()));
        assert_eq!(builder.max_pool_size, Some(20));
    }

    #[test]
    fn test_client_builder_config() {
        let config = MongoClient::builder()
            .database("test")
            .direct_connection(true)
            .config()
            .unwrap();
        assert_eq!(config.uri, "mongodb://localhost:27017");
        assert_eq!(config.direct_connection, Some(true));
    }

    #[test]
    fn test_client_builder_requires_database() {
        let err = MongoClient::builder().build().err().unwrap();
        assert!(err.is_config_error());
    }
}
