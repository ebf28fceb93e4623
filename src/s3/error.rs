use thiserror::Error;

/// Errors that can occur when interacting with the object store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object with key {0} not found")]
    ObjectNotFound(String),

    #[error("Access denied for object {0}: {1}")]
    AccessDenied(String, String),

    #[error("Object store unavailable for {0}: {1}")]
    Unavailable(String, String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Other storage error: {0}")]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Only transient infrastructure failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(..))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectNotFound(_))
    }
}
