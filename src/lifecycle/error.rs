use crate::db::DatabaseError;
use crate::s3::StorageError;
use crate::version::VersionError;
use thiserror::Error;

/// Failures surfaced by artifact lifecycle operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Artifact {0} not found")]
    NotFound(i64),

    #[error("Version already exists at {0}")]
    VersionConflict(String),

    #[error("Failed to write object {key}: {source}")]
    StorageWriteFailed {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to read object {key}: {source}")]
    StorageReadFailed {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to delete object {key}: {source}")]
    StorageDeleteFailed {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write metadata for {key}: {source}")]
    MetadataWriteFailed {
        key: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to read metadata: {0}")]
    MetadataReadFailed(#[source] DatabaseError),

    #[error("Failed to delete metadata record {id}: {source}")]
    MetadataDeleteFailed {
        id: i64,
        #[source]
        source: DatabaseError,
    },
}

impl LifecycleError {
    /// Stable name of the failure, reported per file in batch results
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::InvalidArgument(_) => "InvalidArgument",
            LifecycleError::NotFound(_) => "NotFound",
            LifecycleError::VersionConflict(_) => "VersionConflict",
            LifecycleError::StorageWriteFailed { .. } => "StorageWriteFailed",
            LifecycleError::StorageReadFailed { .. } => "StorageReadFailed",
            LifecycleError::StorageDeleteFailed { .. } => "StorageDeleteFailed",
            LifecycleError::MetadataWriteFailed { .. } => "MetadataWriteFailed",
            LifecycleError::MetadataReadFailed(_) => "MetadataReadFailed",
            LifecycleError::MetadataDeleteFailed { .. } => "MetadataDeleteFailed",
        }
    }
}

impl From<VersionError> for LifecycleError {
    fn from(e: VersionError) -> Self {
        LifecycleError::InvalidArgument(e.to_string())
    }
}
