//! Registry of store connections handed to mappers and models.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{OdmError, OdmResult};
use crate::model::ModelType;
use crate::store::{Collection, Store};

/// Named store connections plus mapper-wide defaults.
///
/// A registry is built once at startup and passed to every mapper and model
/// operation. Cloning shares the underlying store handles.
///
/// ```rust
/// use docmap_core::Database;
/// use docmap_core::memory::MemoryStore;
///
/// let db = Database::single(MemoryStore::new());
/// assert!(db.connection(Database::DEFAULT_CONNECTION).is_some());
///
/// let db = Database::new()
///     .with_connection("main", MemoryStore::new())
///     .with_connection("archive", MemoryStore::new())
///     .with_default_collection_name("documents");
/// assert_eq!(db.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Database {
    connections: IndexMap<String, Arc<dyn Store>>,
    default_collection_name: Option<String>,
}

impl Database {
    /// Name given to a connection registered with [`Database::single`].
    pub const DEFAULT_CONNECTION: &'static str = "default";

    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with one store registered as `default`.
    pub fn single(store: impl Store + 'static) -> Self {
        Self::new().with_connection(Self::DEFAULT_CONNECTION, store)
    }

    /// Create a registry from named store handles.
    pub fn from_connections<I, K>(connections: I) -> Self
    where
        I: IntoIterator<Item = (K, Arc<dyn Store>)>,
        K: Into<String>,
    {
        Self {
            connections: connections
                .into_iter()
                .map(|(name, store)| (name.into(), store))
                .collect(),
            default_collection_name: None,
        }
    }

    /// Register a named connection.
    pub fn with_connection(mut self, name: impl Into<String>, store: impl Store + 'static) -> Self {
        self.connections.insert(name.into(), Arc::new(store));
        self
    }

    /// Register a shared store handle under a name.
    pub fn with_shared_connection(mut self, name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.connections.insert(name.into(), store);
        self
    }

    /// Collection used by models that do not declare one.
    pub fn with_default_collection_name(mut self, name: impl Into<String>) -> Self {
        self.default_collection_name = Some(name.into());
        self
    }

    /// The fallback collection name.
    pub fn default_collection_name(&self) -> Option<&str> {
        self.default_collection_name.as_deref()
    }

    /// Get a connection by name.
    pub fn connection(&self, name: &str) -> Option<&Arc<dyn Store>> {
        self.connections.get(name)
    }

    /// Names of the registered connections, in registration order.
    pub fn connection_names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Fail unless at least one connection is registered.
    pub fn ensure_configured(&self) -> OdmResult<()> {
        if self.connections.is_empty() {
            return Err(OdmError::config(
                "no database configured, register a store connection first",
            ));
        }
        Ok(())
    }

    /// Resolve the store for a connection name, or the first registered one.
    pub fn store(&self, connection: Option<&str>) -> OdmResult<&Arc<dyn Store>> {
        match connection {
            Some(name) => self.connections.get(name).ok_or_else(|| {
                OdmError::config(format!("no database connection named '{}'", name))
            }),
            None => self.connections.values().next().ok_or_else(|| {
                OdmError::config("no database configured, register a store connection first")
            }),
        }
    }

    /// Collection name for a model, falling back to the registry default.
    pub fn collection_name(&self, model: &ModelType) -> OdmResult<String> {
        model
            .collection_name()
            .map(str::to_string)
            .or_else(|| {
                self.default_collection_name
                    .clone()
                    .filter(|name| !name.is_empty())
            })
            .ok_or_else(|| {
                OdmError::config(format!("model {} has no collection name", model.name()))
            })
    }

    /// Collection handle for a model.
    pub fn collection(&self, model: &ModelType) -> OdmResult<Arc<dyn Collection>> {
        let name = self.collection_name(model)?;
        let store = self.store(model.connection_name())?;
        Ok(store.collection(&name))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.connections.keys().collect::<Vec<_>>())
            .field("default_collection_name", &self.default_collection_name)
            .finish()
    }
}
