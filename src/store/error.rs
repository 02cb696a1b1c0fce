//! Error types for the document store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or create the database file.
    #[error("Failed to open document store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to run a schema migration.
    #[error("Document store migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    /// A query failed.
    #[error("Document store query failed: {0}")]
    Query(String),

    /// A document could not be encoded or decoded.
    #[error("Document in '{collection}' is not valid JSON: {source}")]
    Serialization {
        collection: String,
        source: serde_json::Error,
    },

    /// Failed to create the directory holding the database file.
    #[error("Failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to join a blocking task.
    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    /// The database schema version is newer than supported.
    #[error("Store schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl StoreError {
    /// Create a Query error from a rusqlite error.
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }
}
