use crate::reconcile::error::ReconcileLogError;
use crate::reconcile::log::ReconciliationLog;
use crate::reconcile::models::{InconsistencyKind, ReconciliationItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// A fake in-memory implementation of the ReconciliationLog trait for testing
#[derive(Clone, Default)]
pub struct FakeReconciliationLog {
    items: Arc<RwLock<Vec<ReconciliationItem>>>,
}

#[allow(dead_code)]
impl FakeReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every item ever recorded, resolved or not
    pub fn fake_all_items(&self) -> Vec<ReconciliationItem> {
        self.items.read().unwrap().clone()
    }

    pub fn fake_unresolved_of(&self, kind: InconsistencyKind) -> Vec<ReconciliationItem> {
        self.items
            .read()
            .unwrap()
            .iter()
            .filter(|item| item.kind == kind && item.resolved_at.is_none())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReconciliationLog for FakeReconciliationLog {
    async fn record_item(&self, item: ReconciliationItem) -> Result<bool, ReconcileLogError> {
        let mut items = self.items.write().unwrap();
        let duplicate = items.iter().any(|existing| {
            existing.kind == item.kind
                && existing.storage_key == item.storage_key
                && existing.resolved_at.is_none()
        });
        if duplicate {
            return Ok(false);
        }
        items.push(item);
        Ok(true)
    }

    async fn get_unresolved(&self) -> Result<Vec<ReconciliationItem>, ReconcileLogError> {
        let mut unresolved: Vec<ReconciliationItem> = self
            .items
            .read()
            .unwrap()
            .iter()
            .filter(|item| item.resolved_at.is_none())
            .cloned()
            .collect();
        // Sort to match SQLite behavior
        unresolved.sort_by_key(|item| item.detected_at);
        Ok(unresolved)
    }

    async fn mark_resolved(
        &self,
        id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ReconcileLogError> {
        let mut items = self.items.write().unwrap();
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.resolved_at = Some(resolved_at);
                Ok(())
            }
            None => Err(ReconcileLogError::ItemNotFound(id.to_string())),
        }
    }

    async fn resolve_key(
        &self,
        kind: InconsistencyKind,
        storage_key: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<usize, ReconcileLogError> {
        let mut items = self.items.write().unwrap();
        let mut resolved = 0;
        for item in items.iter_mut().filter(|item| {
            item.kind == kind && item.storage_key == storage_key && item.resolved_at.is_none()
        }) {
            item.resolved_at = Some(resolved_at);
            resolved += 1;
        }
        Ok(resolved)
    }
}
