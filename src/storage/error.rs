use std::io;

use thiserror::Error;

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested entry or object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cloud service rejected or failed the call
    #[error("cloud storage error: {0}")]
    Cloud(String),

    #[error("storage operation timed out after {0}s")]
    Timeout(u64),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
