use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of disagreement between the object store and the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InconsistencyKind {
    /// An object with no metadata record
    OrphanObject,
    /// A metadata record whose object is missing
    DanglingRecord,
}

impl InconsistencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InconsistencyKind::OrphanObject => "ORPHAN_OBJECT",
            InconsistencyKind::DanglingRecord => "DANGLING_RECORD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ORPHAN_OBJECT" => Some(InconsistencyKind::OrphanObject),
            "DANGLING_RECORD" => Some(InconsistencyKind::DanglingRecord),
            _ => None,
        }
    }
}

/// A detected inconsistency awaiting out-of-band repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub id: Uuid,
    pub kind: InconsistencyKind,
    pub storage_key: String,
    /// Metadata record involved, for dangling records
    pub record_id: Option<i64>,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReconciliationItem {
    /// An object left behind without a record
    pub fn orphan(storage_key: &str, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: InconsistencyKind::OrphanObject,
            storage_key: storage_key.to_string(),
            record_id: None,
            reason: reason.into(),
            detected_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// A record that points at a missing object
    pub fn dangling(record_id: i64, storage_key: &str, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: InconsistencyKind::DanglingRecord,
            storage_key: storage_key.to_string(),
            record_id: Some(record_id),
            reason: reason.into(),
            detected_at: Utc::now(),
            resolved_at: None,
        }
    }
}
