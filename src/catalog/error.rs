use crate::db::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to read catalog: {0}")]
    Metadata(#[from] DatabaseError),
}
