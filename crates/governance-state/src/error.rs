//! Error types for governance-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors returned by [`crate::AuditStore`] implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// An entry with this sequence number is already stored
    #[error("audit entry with sequence {sequence} already exists")]
    SequenceConflict { sequence: u64 },

    /// Backend rejected or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Backend is temporarily unable to accept writes
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Stored row could not be decoded
    #[error("corrupt audit row: {0}")]
    Corrupt(String),
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
