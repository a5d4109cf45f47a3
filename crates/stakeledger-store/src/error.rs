//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transaction serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A block that does not extend the stored chain.
    #[error("block at height {height} does not extend tip {tip:?}")]
    NotTip { height: u64, tip: Option<u64> },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding in-process state was poisoned by a panic.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// The backing store is temporarily unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
