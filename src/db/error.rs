use thiserror::Error;

/// Errors that can occur when interacting with the metadata database
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Query execution failed: {0}")]
    QueryError(String),

    #[error("Record conflicts with an existing row: {0}")]
    Conflict(String),

    #[error("Record {0} not found")]
    RecordNotFound(i64),

    #[error("Failed to deserialize database row: {0}")]
    DeserializationError(String),

    #[error("Other database error: {0}")]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Only transient infrastructure failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Unavailable(_))
    }
}
