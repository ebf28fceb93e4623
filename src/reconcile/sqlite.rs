use crate::reconcile::error::ReconcileLogError;
use crate::reconcile::log::ReconciliationLog;
use crate::reconcile::models::{InconsistencyKind, ReconciliationItem};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A SQLite implementation of the ReconciliationLog trait
pub struct SqliteReconciliationLog {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteReconciliationLog {
    /// Open (or create) the log at `db_path`; `:memory:` gives a private in-memory log
    pub fn new(db_path: &str) -> Result<Self, ReconcileLogError> {
        info!("Opening SQLite reconciliation log at path: {db_path}");

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    debug!("Creating parent directory: {:?}", parent);
                    fs::create_dir_all(parent).map_err(|e| {
                        error!("Failed to create directory {parent:?}: {e}");
                        ReconcileLogError::OpenError(format!("Failed to create directory: {e}"))
                    })?;
                }
            }
        }

        let connection = Connection::open(db_path).map_err(|e| {
            error!("Failed to open SQLite database at {db_path}: {e}");
            ReconcileLogError::OpenError(format!("Failed to open SQLite database: {e}"))
        })?;

        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS reconciliation_items (
                    id TEXT PRIMARY KEY,
                    kind TEXT NOT NULL,
                    storage_key TEXT NOT NULL,
                    record_id INTEGER,
                    reason TEXT NOT NULL,
                    detected_at TEXT NOT NULL,
                    resolved_at TEXT
                )",
                [],
            )
            .map_err(|e| {
                error!("Failed to create reconciliation_items table: {e}");
                ReconcileLogError::OpenError(format!(
                    "Failed to create reconciliation_items table: {e}"
                ))
            })?;

        connection
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_reconciliation_unresolved
                 ON reconciliation_items(kind, storage_key) WHERE resolved_at IS NULL",
                [],
            )
            .map_err(|e| {
                error!("Failed to create unresolved index: {e}");
                ReconcileLogError::OpenError(format!("Failed to create unresolved index: {e}"))
            })?;

        info!("SQLite reconciliation log initialized at: {db_path}");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Fixed-width RFC3339 so lexical order matches time order
    fn datetime_to_string(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, ReconcileLogError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ReconcileLogError::OperationError(format!("Failed to parse datetime: {e}")))
    }

    fn lock(connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, ReconcileLogError> {
        connection.lock().map_err(|_| {
            error!("Failed to acquire reconciliation log lock");
            ReconcileLogError::Locked
        })
    }

    fn item_from_row(row: &Row<'_>) -> Result<ReconciliationItem, ReconcileLogError> {
        let read = |e: rusqlite::Error| {
            ReconcileLogError::OperationError(format!("Failed to read row: {e}"))
        };

        let id_str: String = row.get(0).map_err(read)?;
        let kind_str: String = row.get(1).map_err(read)?;
        let detected_at_str: String = row.get(5).map_err(read)?;
        let resolved_at_str: Option<String> = row.get(6).map_err(read)?;

        Ok(ReconciliationItem {
            id: Uuid::parse_str(&id_str).map_err(|e| {
                ReconcileLogError::OperationError(format!("Failed to parse UUID: {e}"))
            })?,
            kind: InconsistencyKind::parse(&kind_str).ok_or_else(|| {
                ReconcileLogError::OperationError(format!("Invalid kind: {kind_str}"))
            })?,
            storage_key: row.get(2).map_err(read)?,
            record_id: row.get(3).map_err(read)?,
            reason: row.get(4).map_err(read)?,
            detected_at: Self::string_to_datetime(&detected_at_str)?,
            resolved_at: resolved_at_str
                .as_deref()
                .map(Self::string_to_datetime)
                .transpose()?,
        })
    }
}

#[async_trait]
impl ReconciliationLog for SqliteReconciliationLog {
    async fn record_item(&self, item: ReconciliationItem) -> Result<bool, ReconcileLogError> {
        debug!(
            "Recording reconciliation item: kind={:?}, key={}, record_id={:?}",
            item.kind, item.storage_key, item.record_id
        );

        let connection = Arc::clone(&self.connection);

        task::spawn_blocking(move || {
            let conn = Self::lock(&connection)?;
            let kind_str = item.kind.as_str();

            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM reconciliation_items
                     WHERE kind = ?1 AND storage_key = ?2 AND resolved_at IS NULL
                     LIMIT 1",
                    params![kind_str, item.storage_key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| {
                    error!("Failed to query reconciliation items: {e}");
                    ReconcileLogError::OperationError(format!("Failed to query items: {e}"))
                })?;

            if let Some(existing_id) = existing {
                debug!(
                    "Unresolved item {existing_id} already tracks {}",
                    item.storage_key
                );
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO reconciliation_items (id, kind, storage_key, record_id, reason, detected_at, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    item.id.to_string(),
                    kind_str,
                    item.storage_key,
                    item.record_id,
                    item.reason,
                    Self::datetime_to_string(item.detected_at),
                    item.resolved_at.map(Self::datetime_to_string),
                ],
            )
            .map_err(|e| {
                error!("Failed to insert reconciliation item: {e}");
                ReconcileLogError::OperationError(format!("Failed to insert item: {e}"))
            })?;

            Ok(true)
        })
        .await
        .map_err(|e| {
            error!("Task panic while recording reconciliation item: {e}");
            ReconcileLogError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn get_unresolved(&self) -> Result<Vec<ReconciliationItem>, ReconcileLogError> {
        let connection = Arc::clone(&self.connection);

        task::spawn_blocking(move || {
            let conn = Self::lock(&connection)?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, kind, storage_key, record_id, reason, detected_at, resolved_at
                     FROM reconciliation_items
                     WHERE resolved_at IS NULL
                     ORDER BY detected_at ASC, id ASC",
                )
                .map_err(|e| {
                    error!("Failed to prepare unresolved query: {e}");
                    ReconcileLogError::OperationError(format!("Failed to prepare query: {e}"))
                })?;

            let mut rows = stmt.query([]).map_err(|e| {
                ReconcileLogError::OperationError(format!("Failed to query items: {e}"))
            })?;

            let mut items = Vec::new();
            while let Some(row) = rows.next().map_err(|e| {
                ReconcileLogError::OperationError(format!("Failed to read items: {e}"))
            })? {
                items.push(Self::item_from_row(row)?);
            }

            debug!("Found {} unresolved reconciliation items", items.len());
            Ok(items)
        })
        .await
        .map_err(|e| {
            error!("Task panic while reading reconciliation items: {e}");
            ReconcileLogError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn mark_resolved(
        &self,
        id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ReconcileLogError> {
        let connection = Arc::clone(&self.connection);
        let id_str = id.to_string();
        let resolved_at_str = Self::datetime_to_string(resolved_at);

        task::spawn_blocking(move || {
            let conn = Self::lock(&connection)?;

            let rows_affected = conn
                .execute(
                    "UPDATE reconciliation_items SET resolved_at = ?1 WHERE id = ?2",
                    params![resolved_at_str, id_str],
                )
                .map_err(|e| {
                    error!("Failed to resolve reconciliation item: {e}");
                    ReconcileLogError::OperationError(format!("Failed to resolve item: {e}"))
                })?;

            if rows_affected == 0 {
                warn!("Reconciliation item not found: id={id_str}");
                return Err(ReconcileLogError::ItemNotFound(id_str));
            }

            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Task panic while resolving reconciliation item: {e}");
            ReconcileLogError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn resolve_key(
        &self,
        kind: InconsistencyKind,
        storage_key: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<usize, ReconcileLogError> {
        let connection = Arc::clone(&self.connection);
        let storage_key = storage_key.to_string();
        let resolved_at_str = Self::datetime_to_string(resolved_at);

        task::spawn_blocking(move || {
            let conn = Self::lock(&connection)?;

            let resolved = conn
                .execute(
                    "UPDATE reconciliation_items SET resolved_at = ?1
                     WHERE kind = ?2 AND storage_key = ?3 AND resolved_at IS NULL",
                    params![resolved_at_str, kind.as_str(), storage_key],
                )
                .map_err(|e| {
                    error!("Failed to resolve items for {storage_key}: {e}");
                    ReconcileLogError::OperationError(format!("Failed to resolve items: {e}"))
                })?;

            debug!("Resolved {resolved} items for {storage_key}");
            Ok(resolved)
        })
        .await
        .map_err(|e| {
            error!("Task panic while resolving reconciliation items: {e}");
            ReconcileLogError::OperationError(format!("Task panic: {e}"))
        })?
    }
}
