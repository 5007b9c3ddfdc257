//! Error types and result types for document session operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Failures coming
//! from a backend driver or from a codec are carried to the caller intact; nothing in this
//! layer retries or suppresses them.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a document session.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A malformed operation or statement was rejected at construction time.
    ///
    /// This is always a caller bug and is raised before anything reaches the queue
    /// or the backend.
    #[error("Contract violation: {0}")]
    ContractViolation(String),
    /// The requested backend/dialect combination is not supported.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),
    /// The backend reported a failure. The message is the driver's diagnostic, unmodified.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A stored payload could not be reconstructed into the requested type.
    #[error("Decode error{}: {message}", key_suffix(.key))]
    Decode {
        /// The key of the offending row, when the row carried one.
        key: Option<String>,
        /// The codec's diagnostic.
        message: String,
    },
    /// A load found no row for the key.
    #[error("Document {key} not found in table {table}")]
    NotFound {
        /// The table that was searched.
        table: String,
        /// The key that was looked up.
        key: String,
    },
    /// A load found more than one row for the key.
    #[error("Document {key} is ambiguous in table {table}: {count} rows matched")]
    Ambiguous {
        /// The table that was searched.
        table: String,
        /// The key that was looked up.
        key: String,
        /// How many rows matched.
        count: usize,
    },
    /// A payload could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A named placeholder in the query text had no matching parameter.
    #[error("Unbound parameter: {0}")]
    UnboundParameter(String),
    /// Error during executor initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref()
        .map(|k| format!(" for key {k}"))
        .unwrap_or_default()
}

/// A specialized `Result` type for document session operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
