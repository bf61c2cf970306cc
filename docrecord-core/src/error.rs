//! Errors raised by document mapping, validation and storage.
//!
//! Vetoed lifecycle events and missing rows are not errors; they surface as `Ok(false)`,
//! `Ok(None)` or an empty cursor. A [`DocumentStoreError`] is either a declaration mistake
//! or a failure reported by the storage backend.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Converting between BSON, JSON and typed values failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The backend could not be set up or connected.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// Insert of a primary key already present: `(id, collection)`.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The payload handed to the backend has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Backend error: {0}")]
    Backend(String),
    /// A document type, rule, validator or behaviour is declared incorrectly.
    ///
    /// Unresolvable validator names, embedded fields with neither nested rules nor a class
    /// and malformed rule descriptors all land here. They are never validation failures.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Document type {0} is not registered")]
    UnregisteredType(String),
    /// The operation is not available for this kind of cursor or backend.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// A server cursor was modified after iteration began.
    #[error("Cursor has already started iterating")]
    CursorStarted,
}

pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Builds a [`DocumentStoreError::Configuration`] and logs it at error level.
    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "document configuration error");

        DocumentStoreError::Configuration(message)
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
