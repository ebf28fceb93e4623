use thiserror::Error;

/// Rejected inputs to the version policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid model name '{0}': {1}")]
    InvalidModelName(String, &'static str),

    #[error("Invalid version token '{0}': {1}")]
    InvalidVersionToken(String, &'static str),

    #[error("keep_count must be positive, got {0}")]
    InvalidKeepCount(i64),
}
