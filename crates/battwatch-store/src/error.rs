//! Error types for battwatch-store.

use std::path::PathBuf;

/// Result type for battwatch-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to create the snapshot directory.
    #[error("Failed to create snapshot directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading, writing or renaming a snapshot file failed.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
