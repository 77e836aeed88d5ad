//! Error types for guardrail-store.

use std::path::PathBuf;
use thiserror::Error;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Requested entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Home/data directory could not be determined.
    #[error("could not determine home/data directory")]
    HomeDirNotFound,

    /// Storage not initialized.
    #[error("storage not initialized")]
    NotInitialized,
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
