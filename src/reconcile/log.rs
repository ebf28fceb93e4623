use crate::reconcile::error::ReconcileLogError;
use crate::reconcile::models::{InconsistencyKind, ReconciliationItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Durable journal of orphan objects and dangling records
#[async_trait]
pub trait ReconciliationLog: Send + Sync + 'static {
    /// Append an item unless an unresolved item of the same kind already
    /// exists for the key. Returns whether the item was stored.
    async fn record_item(&self, item: ReconciliationItem) -> Result<bool, ReconcileLogError>;

    /// Unresolved items, oldest first
    async fn get_unresolved(&self) -> Result<Vec<ReconciliationItem>, ReconcileLogError>;

    /// Mark one item resolved
    async fn mark_resolved(
        &self,
        id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ReconcileLogError>;

    /// Mark every unresolved item of `kind` for `storage_key` resolved.
    /// Returns how many items changed.
    async fn resolve_key(
        &self,
        kind: InconsistencyKind,
        storage_key: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<usize, ReconcileLogError>;
}

/// Implementation of ReconciliationLog trait for Arc<T> where T implements ReconciliationLog
#[async_trait]
impl<T: ReconciliationLog + ?Sized> ReconciliationLog for Arc<T> {
    async fn record_item(&self, item: ReconciliationItem) -> Result<bool, ReconcileLogError> {
        (**self).record_item(item).await
    }

    async fn get_unresolved(&self) -> Result<Vec<ReconciliationItem>, ReconcileLogError> {
        (**self).get_unresolved().await
    }

    async fn mark_resolved(
        &self,
        id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ReconcileLogError> {
        (**self).mark_resolved(id, resolved_at).await
    }

    async fn resolve_key(
        &self,
        kind: InconsistencyKind,
        storage_key: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<usize, ReconcileLogError> {
        (**self).resolve_key(kind, storage_key, resolved_at).await
    }
}
