use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored version of a model artifact (a row in artifact_versions)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: i64,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "s3_key")]
    pub storage_key: String,
    #[serde(rename = "file_size")]
    pub file_size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Values supplied by the caller when inserting a record; the store assigns
/// `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifactRecord {
    pub model_name: String,
    pub version: Option<String>,
    pub storage_key: String,
    pub file_size_bytes: i64,
}

/// A window of records ordered newest first, with the size of the whole table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<ArtifactRecord>,
    pub total_count: u64,
}
