//! Error types for buildcast-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Connection(err.to_string())
    }
}

/// Errors returned by [`crate::PreferenceStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No value is stored under the key.
    #[error("no value stored for key '{key}'")]
    NotFound { key: String },

    /// A compare-and-swap lost against a concurrent writer.
    #[error("version conflict on '{key}': expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
