//! Error types for MongoDB operations.

use docmap_core::OdmError;
use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// Result type for MongoDB operations.
pub type MongoResult<T> = Result<T, MongoError>;

/// Server error code of a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Errors that can occur during MongoDB operations.
#[derive(Error, Debug)]
pub enum MongoError {
    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Document serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid ObjectId.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),
}

impl MongoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Check if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Driver(err) => matches!(
                err.kind.as_ref(),
                ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } | ErrorKind::ServerSelection { .. }
            ),
            _ => false,
        }
    }

    /// Check if the server rejected a write for violating a unique index.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::Driver(err) => matches!(
                err.kind.as_ref(),
                ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
            ),
            _ => false,
        }
    }
}

impl From<bson::oid::Error> for MongoError {
    fn from(err: bson::oid::Error) -> Self {
        MongoError::InvalidObjectId(err.to_string())
    }
}

impl From<bson::de::Error> for MongoError {
    fn from(err: bson::de::Error) -> Self {
        MongoError::Serialization(err.to_string())
    }
}

impl From<MongoError> for OdmError {
    fn from(err: MongoError) -> Self {
        match err {
            MongoError::Config(msg) => OdmError::config(msg),
            MongoError::InvalidObjectId(msg) => OdmError::invalid_object_id(msg),
            MongoError::Serialization(msg) => OdmError::serialization(msg),
            other => OdmError::store(other),
        }
    }
}
