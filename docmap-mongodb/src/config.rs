//! MongoDB connection configuration.
//!
//! The blocking driver is configured through its connection string, so
//! every option set here is rendered into the URI by
//! [`MongoConfig::to_connection_string`].

use std::time::Duration;

use docmap_core::env::{EnvSource, StdEnvSource};
use url::form_urlencoded;

use crate::error::{MongoError, MongoResult};

/// Variable holding the connection URI.
pub const URI_VAR: &str = "DOCMAP_MONGODB_URI";
/// Variable holding the database name.
pub const DATABASE_VAR: &str = "DOCMAP_MONGODB_DATABASE";
/// Variable holding the application name.
pub const APP_NAME_VAR: &str = "DOCMAP_MONGODB_APP_NAME";

const DEFAULT_URI: &str = "mongodb://localhost:27017";
const DEFAULT_APP_NAME: &str = "docmap";

/// MongoDB connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MongoConfig {
    /// MongoDB connection URI.
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Application name (shown in server logs).
    pub app_name: Option<String>,
    /// Minimum connection pool size.
    pub min_pool_size: Option<u32>,
    /// Maximum connection pool size.
    pub max_pool_size: Option<u32>,
    /// Maximum idle time for connections.
    pub max_idle_time: Option<Duration>,
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout.
    pub server_selection_timeout: Option<Duration>,
    /// Socket timeout.
    pub socket_timeout: Option<Duration>,
    /// Wire compressors (zlib, snappy, zstd).
    pub compressors: Option<Vec<String>>,
    /// Read preference.
    pub read_preference: Option<ReadPreference>,
    /// Write concern.
    pub write_concern: Option<WriteConcern>,
    /// Retry writes.
    pub retry_writes: Option<bool>,
    /// Retry reads.
    pub retry_reads: Option<bool>,
    /// Direct connection (bypass replica set discovery).
    pub direct_connection: Option<bool>,
}

/// MongoDB read preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreference {
    /// Read from primary only.
    #[default]
    Primary,
    /// Read from primary preferred, fallback to secondary.
    PrimaryPreferred,
    /// Read from secondary only.
    Secondary,
    /// Read from secondary preferred, fallback to primary.
    SecondaryPreferred,
    /// Read from nearest member.
    Nearest,
}

impl ReadPreference {
    /// Connection string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        }
    }
}

/// MongoDB write concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteConcern {
    /// Acknowledge writes from the specified number of nodes.
    W(u32),
    /// Acknowledge writes from majority of nodes.
    Majority,
    /// Custom tag set.
    Custom(String),
}

impl WriteConcern {
    fn to_param(&self) -> String {
        match self {
            Self::W(n) => n.to_string(),
            Self::Majority => "majority".to_string(),
            Self::Custom(tag) => tag.clone(),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: String::new(),
            app_name: Some(DEFAULT_APP_NAME.to_string()),
            min_pool_size: None,
            max_pool_size: Some(10),
            max_idle_time: Some(Duration::from_secs(300)),
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            socket_timeout: None,
            compressors: None,
            read_preference: Some(ReadPreference::Primary),
            write_concern: None,
            retry_writes: Some(true),
            retry_reads: Some(true),
            direct_connection: None,
        }
    }
}

impl MongoConfig {
    /// Create a new configuration from a MongoDB URI.
    pub fn from_uri(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> MongoResult<Self> {
        Self::from_source(&StdEnvSource)
    }

    /// Read the configuration from an environment source.
    ///
    /// `DOCMAP_MONGODB_DATABASE` is required; the URI defaults to a local
    /// server.
    pub fn from_source(source: &impl EnvSource) -> MongoResult<Self> {
        let mut builder = Self::builder();
        if let Some(uri) = source.get(URI_VAR) {
            builder = builder.uri(uri);
        }
        if let Some(database) = source.get(DATABASE_VAR) {
            builder = builder.database(database);
        }
        if let Some(app_name) = source.get(APP_NAME_VAR) {
            builder = builder.app_name(app_name);
        }
        builder.build()
    }

    /// Create a builder for configuration.
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::new()
    }

    /// Render the URI with every configured option appended.
    pub fn to_connection_string(&self) -> MongoResult<String> {
        if !self.uri.starts_with("mongodb://") && !self.uri.starts_with("mongodb+srv://") {
            return Err(MongoError::config(format!(
                "unsupported connection string scheme: {}",
                self.uri
            )));
        }

        let mut params = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        let mut push = |key: &str, value: String| {
            params.append_pair(key, &value);
            any = true;
        };

        if let Some(ref app_name) = self.app_name {
            push("appName", app_name.clone());
        }
        if let Some(size) = self.min_pool_size {
            push("minPoolSize", size.to_string());
        }
        if let Some(size) = self.max_pool_size {
            push("maxPoolSize", size.to_string());
        }
        if let Some(idle) = self.max_idle_time {
            push("maxIdleTimeMS", idle.as_millis().to_string());
        }
        if let Some(timeout) = self.connect_timeout {
            push("connectTimeoutMS", timeout.as_millis().to_string());
        }
        if let Some(timeout) = self.server_selection_timeout {
            push("serverSelectionTimeoutMS", timeout.as_millis().to_string());
        }
        if let Some(timeout) = self.socket_timeout {
            push("socketTimeoutMS", timeout.as_millis().to_string());
        }
        if let Some(ref compressors) = self.compressors {
            push("compressors", compressors.join(","));
        }
        if let Some(pref) = self.read_preference {
            push("readPreference", pref.as_str().to_string());
        }
        if let Some(ref wc) = self.write_concern {
            push("w", wc.to_param());
        }
        if let Some(retry) = self.retry_writes {
            push("retryWrites", retry.to_string());
        }
        if let Some(retry) = self.retry_reads {
            push("retryReads", retry.to_string());
        }
        if let Some(direct) = self.direct_connection {
            push("directConnection", direct.to_string());
        }

        if !any {
            return Ok(self.uri.clone());
        }

        let query = params.finish();
        let separator = match self.uri.split_once('?') {
            Some((_, existing)) if existing.is_empty() => "",
            Some(_) => "&",
            None => {
                // Options follow the host list, which needs a trailing slash.
                let authority = self.uri.split_once("://").map_or("", |(_, rest)| rest);
                if authority.contains('/') { "?" } else { "/?" }
            }
        };
        Ok(format!("{}{}{}", self.uri, separator, query))
    }
}

/// Builder for MongoDB configuration.
#[derive(Debug, Default)]
pub struct MongoConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    max_idle_time: Option<Duration>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
    socket_timeout: Option<Duration>,
    compressors: Option<Vec<String>>,
    read_preference: Option<ReadPreference>,
    write_concern: Option<WriteConcern>,
    retry_writes: Option<bool>,
    retry_reads: Option<bool>,
    direct_connection: Option<bool>,
}

impl MongoConfigBuilder {
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

    /// Set the minimum pool size.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the maximum idle time for connections.
    pub fn max_idle_time(mut self, duration: Duration) -> Self {
        self.max_idle_time = Some(duration);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the server selection timeout.
    pub fn server_selection_timeout(mut self, duration: Duration) -> Self {
        self.server_selection_timeout = Some(duration);
        self
    }

    /// Set the socket timeout.
    pub fn socket_timeout(mut self, duration: Duration) -> Self {
        self.socket_timeout = Some(duration);
        self
    }

    /// Enable compression (zlib, snappy, or zstd).
    pub fn compressors(mut self, compressors: Vec<String>) -> Self {
        self.compressors = Some(compressors);
        self
    }

    /// Set the read preference.
    pub fn read_preference(mut self, pref: ReadPreference) -> Self {
        self.read_preference = Some(pref);
        self
    }

    /// Set the write concern.
    pub fn write_concern(mut self, wc: WriteConcern) -> Self {
        self.write_concern = Some(wc);
        self
    }

    /// Enable or disable retry writes.
    pub fn retry_writes(mut self, enabled: bool) -> Self {
        self.retry_writes = Some(enabled);
        self
    }

    /// Enable or disable retry reads.
    pub fn retry_reads(mut self, enabled: bool) -> Self {
        self.retry_reads = Some(enabled);
        self
    }

    /// Enable direct connection (bypass replica set discovery).
    pub fn direct_connection(mut self, enabled: bool) -> Self {
        self.direct_connection = Some(enabled);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MongoResult<MongoConfig> {
        let database = self
            .database
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MongoError::config("database name is required"))?;
        let defaults = MongoConfig::default();

        Ok(MongoConfig {
            uri: self.uri.unwrap_or(defaults.uri),
            database,
            app_name: self.app_name.or(defaults.app_name),
            min_pool_size: self.min_pool_size,
            max_pool_size: self.max_pool_size.or(defaults.max_pool_size),
            max_idle_time: self.max_idle_time.or(defaults.max_idle_time),
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            server_selection_timeout: self
                .server_selection_timeout
                .or(defaults.server_selection_timeout),
            socket_timeout: self.socket_timeout,
            compressors: self.compressors,
            read_preference: self.read_preference.or(defaults.read_preference),
            write_concern: self.write_concern,
            retry_writes: self.retry_writes.or(defaults.retry_writes),
            retry_reads: self.retry_reads.or(defaults.retry_reads),
            direct_connection: self.direct_connection,
        })
    }
}
