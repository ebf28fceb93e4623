use crate::db::ArtifactRecord;
use bytes::Bytes;
use serde::Serialize;

/// One artifact version to store under an explicit model name
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub model_name: String,
    pub version: Option<String>,
    pub content: Bytes,
}

/// A file from a batch upload; the model name comes from the filename
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content: Bytes,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub filename: String,
    /// Error kind, e.g. `InvalidArgument`
    pub reason: String,
    pub detail: String,
}

/// Outcome of a batch upload, in input order
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub uploaded_files: Vec<ArtifactRecord>,
    pub failed_files: Vec<FailedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedEviction {
    pub id: i64,
    pub storage_key: String,
    pub reason: String,
    pub detail: String,
}

/// Result of a retention cleanup, records newest first
#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    pub model_name: String,
    pub kept: Vec<ArtifactRecord>,
    pub evicted: Vec<ArtifactRecord>,
    pub failed: Vec<FailedEviction>,
}

#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub record: ArtifactRecord,
    /// Attachment name, `{model_name}{extension}`
    pub filename: String,
    pub content: Bytes,
}

/// Disagreements found between the two stores
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Keys present in the object store with no record
    pub orphan_objects: Vec<String>,
    /// Records whose object is missing
    pub dangling_records: Vec<ArtifactRecord>,
    pub repaired: usize,
}
