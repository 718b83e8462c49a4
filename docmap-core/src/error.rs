//! Error types for mapping and store operations.
//!
//! Misuse fails fast with a configuration error at the call site. A document
//! that is not found is never an error: single-document fetches return
//! `Option`. Failures coming from the store client are carried through
//! untouched in [`OdmError::Store`] so callers can inspect the driver error.

use thiserror::Error;

/// Result type for mapper and model operations.
pub type OdmResult<T> = Result<T, OdmError>;

/// Errors that can occur while mapping documents.
#[derive(Error, Debug)]
pub enum OdmError {
    /// The mapper or model is not configured for the requested operation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cursor-dependent operation ran before `find`.
    #[error("there is no cursor, call find before reading results")]
    NoCursor,

    /// The record has no `_id` to address the document with.
    #[error("record has no _id")]
    MissingId,

    /// A value could not be read as an ObjectId.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    /// BSON conversion failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure reported by the underlying store client.
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OdmError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid object id error.
    pub fn invalid_object_id(message: impl Into<String>) -> Self {
        Self::InvalidObjectId(message.into())
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Wrap a store client error.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }

    /// Check if this is a configuration error (including a missing cursor).
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NoCursor)
    }

    /// Check if this error was raised because no cursor was active.
    pub fn is_no_cursor(&self) -> bool {
        matches!(self, Self::NoCursor)
    }

    /// Check if this error came from the store client.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Borrow the store client error as a concrete type.
    pub fn store_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Store(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<bson::oid::Error> for OdmError {
    fn from(err: bson::oid::Error) -> Self {
        OdmError::InvalidObjectId(err.to_string())
    }
}

impl From<bson::de::Error> for OdmError {
    fn from(err: bson::de::Error) -> Self {
        OdmError::Serialization(err.to_string())
    }
}

impl From<bson::ser::Error> for OdmError {
    fn from(err: bson::ser::Error) -> Self {
        OdmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("socket closed")]
    struct SocketClosed;

    #[test]
    fn test_error_creation() {
        let err = OdmError::config("missing collection");
        assert!(err.is_config_error());
        assert!(!err.is_no_cursor());

        let err = OdmError::NoCursor;
        assert!(err.is_config_error());
        assert!(err.is_no_cursor());

        let err = OdmError::store(SocketClosed);
        assert!(err.is_store_error());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = OdmError::config("test error");
        assert_eq!(err.to_string(), "configuration error: test error");

        let err = OdmError::store(SocketClosed);
        assert_eq!(err.to_string(), "store error: socket closed");
    }

    #[test]
    fn test_store_error_downcast() {
        let err = OdmError::store(SocketClosed);
        assert!(err.store_error::<SocketClosed>().is_some());
        assert!(OdmError::MissingId.store_error::<SocketClosed>().is_none());
    }

    #[test]
    fn test_from_oid_error() {
        let err: OdmError = bson::oid::ObjectId::parse_str("nope").unwrap_err().into();
        assert!(matches!(err, OdmError::InvalidObjectId(_)));
    }
}
