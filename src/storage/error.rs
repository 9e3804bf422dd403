//! Record store error types
//!
//! Defines all errors that can occur while indexing, querying and
//! snapshotting records.

use thiserror::Error;

/// Errors that can occur in the record store
#[derive(Error, Debug)]
pub enum RosterError {
    /// The id, or a value of a unique field, is already taken
    #[error("Duplicate key in {collection}: {field} '{value}' already exists")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    /// Requested record does not exist
    #[error("Not found in {collection}: {id}")]
    NotFound { collection: String, id: String },

    /// Caller-supplied value failed type or range validation
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Data corruption detected (checksum mismatch, invalid magic, etc.)
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Snapshot written by a newer format version
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// A snapshot was readable but its content is inconsistent
    #[error("Invalid snapshot in {collection}{}: {reason}", .record.as_ref().map(|r| format!(" (record {})", r)).unwrap_or_default())]
    Snapshot {
        collection: String,
        record: Option<String>,
        reason: String,
    },

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl RosterError {
    pub fn duplicate(
        collection: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        RosterError::DuplicateKey {
            collection: collection.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        RosterError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RosterError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error rejected an insert because of a taken key
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RosterError::DuplicateKey { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RosterError::NotFound { .. })
    }
}

impl From<bincode::Error> for RosterError {
    fn from(err: bincode::Error) -> Self {
        RosterError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RosterError {
    fn from(err: serde_json::Error) -> Self {
        RosterError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for RosterError {
    fn from(err: csv::Error) -> Self {
        RosterError::Serialization(format!("CSV: {}", err))
    }
}

/// Result type alias for record store operations
pub type RosterResult<T> = Result<T, RosterError>;
