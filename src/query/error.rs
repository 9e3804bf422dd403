//! Query error types
//!
//! Defines all error conditions that can occur during query parsing and execution.

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Query parsing failed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Referenced collection does not exist
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Roster layer error
    #[error("Roster error: {0}")]
    Roster(#[from] crate::storage::RosterError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
