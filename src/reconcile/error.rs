use thiserror::Error;

/// Errors that can occur when reading or writing the reconciliation log
#[derive(Error, Debug)]
pub enum ReconcileLogError {
    #[error("Failed to open reconciliation log: {0}")]
    OpenError(String),

    #[error("Reconciliation log operation failed: {0}")]
    OperationError(String),

    #[error("Reconciliation item {0} not found")]
    ItemNotFound(String),

    #[error("Reconciliation log is locked")]
    Locked,

    #[error("Other reconciliation log error: {0}")]
    Other(#[from] anyhow::Error),
}
