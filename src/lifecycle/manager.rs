use crate::config::LifecycleConfig;
use crate::db::{ArtifactRecord, DatabaseError, MetadataStore, NewArtifactRecord};
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::locks::NameLocks;
use crate::lifecycle::models::{
    CleanupSummary, DownloadedArtifact, FailedEviction, FailedFile, ReconcileReport,
    UploadFile, UploadRequest, UploadSummary,
};
use crate::lifecycle::retry::RetryPolicy;
use crate::reconcile::{InconsistencyKind, ReconciliationItem, ReconciliationLog};
use crate::s3::{ObjectStore, StorageError};
use crate::version::{
    derive_storage_key, model_name_from_filename, select_versions_to_evict, sort_newest_first,
    validate_model_name, VersionToken,
};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Records fetched per page while walking the metadata store
const RECONCILE_PAGE_SIZE: u64 = 100;

/// Orchestrates writes and deletes across the object store and the metadata
/// store.
///
/// Objects are written before their record and deleted before their record.
/// A failure between the two steps is compensated where possible; anything
/// left inconsistent goes to the reconciliation log.
pub struct ArtifactManager<D: MetadataStore, S: ObjectStore, L: ReconciliationLog> {
    database: Arc<D>,
    storage: Arc<S>,
    reconciliation_log: Arc<L>,
    retry: RetryPolicy,
    extension: String,
    locks: NameLocks,
}

impl<D: MetadataStore, S: ObjectStore, L: ReconciliationLog> ArtifactManager<D, S, L> {
    pub fn new(database: D, storage: S, reconciliation_log: L, config: &LifecycleConfig) -> Self {
        ArtifactManager {
            database: Arc::new(database),
            storage: Arc::new(storage),
            reconciliation_log: Arc::new(reconciliation_log),
            retry: RetryPolicy::from_config(config),
            extension: config.artifact_extension.clone(),
            locks: NameLocks::new(),
        }
    }

    /// Store one artifact version and record it.
    ///
    /// The object is written first. If the record cannot be written the
    /// object is deleted again, and logged as an orphan when that fails too.
    pub async fn upload(&self, request: UploadRequest) -> Result<ArtifactRecord, LifecycleError> {
        let UploadRequest {
            model_name,
            version,
            content,
        } = request;

        validate_model_name(&model_name)?;
        let token = version.as_deref().map(VersionToken::parse).transpose()?;
        if content.is_empty() {
            return Err(LifecycleError::InvalidArgument(format!(
                "Content for model {} is empty",
                model_name
            )));
        }
        let file_size_bytes = i64::try_from(content.len()).map_err(|_| {
            LifecycleError::InvalidArgument(format!("Content for model {} is too large", model_name))
        })?;
        let storage_key = derive_storage_key(&model_name, token.as_ref(), &self.extension)?;

        let _guard = self.locks.acquire(&model_name).await;

        let existing = self
            .retry
            .run("Lookup record by key", DatabaseError::is_transient, || {
                self.database.get_record_by_key(&storage_key)
            })
            .await
            .map_err(LifecycleError::MetadataReadFailed)?;
        if let Some(existing) = existing {
            warn!(
                "Rejecting upload for {}: record {} already owns the key",
                storage_key, existing.id
            );
            return Err(LifecycleError::VersionConflict(storage_key));
        }

        debug!("Writing {} bytes to {}", file_size_bytes, storage_key);
        self.retry
            .run("Put object", StorageError::is_transient, || {
                self.storage.put_object(&storage_key, content.clone())
            })
            .await
            .map_err(|source| {
                error!("Failed to write object {}: {}", storage_key, source);
                LifecycleError::StorageWriteFailed {
                    key: storage_key.clone(),
                    source,
                }
            })?;

        let new_record = NewArtifactRecord {
            model_name,
            version: token.map(|t| t.to_string()),
            storage_key: storage_key.clone(),
            file_size_bytes,
        };

        let mut insert_attempts = 0u32;
        let inserted = self
            .retry
            .run("Insert record", DatabaseError::is_transient, || {
                insert_attempts += 1;
                self.database.insert_record(new_record.clone())
            })
            .await;

        // A retried insert may collide with its own earlier, unacknowledged commit
        let inserted = match inserted {
            Err(DatabaseError::Conflict(message)) if insert_attempts > 1 => {
                self.claim_unacknowledged_insert(&new_record, message).await
            }
            other => other,
        };

        match inserted {
            Ok(record) => {
                info!(
                    "Uploaded {} as record {} ({} bytes)",
                    record.storage_key, record.id, record.file_size_bytes
                );
                Ok(record)
            }
            Err(DatabaseError::Conflict(message)) => {
                // Another writer committed the key; its record now points at our object
                warn!("Concurrent upload claimed {}: {}", storage_key, message);
                Err(LifecycleError::VersionConflict(storage_key))
            }
            Err(source) => {
                error!("Failed to record {}: {}", storage_key, source);
                self.compensate_orphan(&storage_key, &source).await;
                Err(LifecycleError::MetadataWriteFailed {
                    key: storage_key,
                    source,
                })
            }
        }
    }

    /// The record under `new_record`'s key when it is exactly the one this
    /// upload meant to write; otherwise the original conflict
    async fn claim_unacknowledged_insert(
        &self,
        new_record: &NewArtifactRecord,
        message: String,
    ) -> Result<ArtifactRecord, DatabaseError> {
        let existing = self
            .retry
            .run("Lookup record by key", DatabaseError::is_transient, || {
                self.database.get_record_by_key(&new_record.storage_key)
            })
            .await;

        match existing {
            Ok(Some(record))
                if record.model_name == new_record.model_name
                    && record.version == new_record.version
                    && record.file_size_bytes == new_record.file_size_bytes =>
            {
                info!(
                    "Insert of {} had committed before its retry; keeping record {}",
                    record.storage_key, record.id
                );
                Ok(record)
            }
            Ok(_) => Err(DatabaseError::Conflict(message)),
            Err(e) => {
                warn!(
                    "Could not check ownership of {}: {}",
                    new_record.storage_key, e
                );
                Err(DatabaseError::Conflict(message))
            }
        }
    }

    /// Upload every file concurrently; one failure never aborts the others
    pub async fn upload_batch(&self, files: Vec<UploadFile>) -> UploadSummary {
        info!("Uploading batch of {} files", files.len());

        let uploads = files.into_iter().map(|file| async move {
            let filename = file.filename.clone();
            let result = self.upload_file(file).await;
            (filename, result)
        });
        let results = join_all(uploads).await;

        let mut uploaded_files = Vec::new();
        let mut failed_files = Vec::new();
        for (filename, result) in results {
            match result {
                Ok(record) => uploaded_files.push(record),
                Err(e) => {
                    warn!("Upload of {} failed: {}", filename, e);
                    failed_files.push(FailedFile {
                        filename,
                        reason: e.kind().to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch upload finished: {} succeeded, {} failed",
            uploaded_files.len(),
            failed_files.len()
        );

        UploadSummary {
            success_count: uploaded_files.len(),
            failed_count: failed_files.len(),
            uploaded_files,
            failed_files,
        }
    }

    async fn upload_file(&self, file: UploadFile) -> Result<ArtifactRecord, LifecycleError> {
        if !file.filename.ends_with(&self.extension) {
            return Err(LifecycleError::InvalidArgument(format!(
                "Unsupported file {}: only {} files are accepted",
                file.filename, self.extension
            )));
        }
        let model_name = model_name_from_filename(&file.filename, &self.extension);

        self.upload(UploadRequest {
            model_name,
            version: file.version,
            content: file.content,
        })
        .await
    }

    /// Delete one version, object first. Returns the removed record.
    pub async fn delete_version(&self, id: i64) -> Result<ArtifactRecord, LifecycleError> {
        let record = self.find_record(id).await?;

        let _guard = self.locks.acquire(&record.model_name).await;
        self.remove_version(&record).await?;

        info!("Deleted version {} ({})", record.id, record.storage_key);
        Ok(record)
    }

    /// Keep the `keep_count` newest versions of `model_name` and delete the rest.
    ///
    /// Evictions are attempted independently; failures are reported in the
    /// summary rather than aborting the cleanup.
    pub async fn cleanup_old_versions(
        &self,
        model_name: &str,
        keep_count: i64,
    ) -> Result<CleanupSummary, LifecycleError> {
        validate_model_name(model_name)?;

        let _guard = self.locks.acquire(model_name).await;

        let records = self
            .retry
            .run("Fetch records by name", DatabaseError::is_transient, || {
                self.database.get_records_by_name(model_name)
            })
            .await
            .map_err(LifecycleError::MetadataReadFailed)?;

        let victims = select_versions_to_evict(records.clone(), keep_count)?;
        let victim_ids: HashSet<i64> = victims.iter().map(|record| record.id).collect();
        let kept = sort_newest_first(
            records
                .into_iter()
                .filter(|record| !victim_ids.contains(&record.id))
                .collect(),
        );
        debug!(
            "Retention for {}: keeping {}, evicting {}",
            model_name,
            kept.len(),
            victims.len()
        );

        let mut evicted = Vec::new();
        let mut failed = Vec::new();
        for record in victims {
            match self.remove_version(&record).await {
                Ok(()) => evicted.push(record),
                Err(e) => {
                    warn!("Failed to evict {}: {}", record.storage_key, e);
                    failed.push(FailedEviction {
                        id: record.id,
                        storage_key: record.storage_key,
                        reason: e.kind().to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Cleanup of {} finished: kept {}, evicted {}, failed {}",
            model_name,
            kept.len(),
            evicted.len(),
            failed.len()
        );

        Ok(CleanupSummary {
            model_name: model_name.to_string(),
            kept,
            evicted,
            failed,
        })
    }

    /// Fetch a version's content and its attachment filename
    pub async fn download(&self, id: i64) -> Result<DownloadedArtifact, LifecycleError> {
        let record = self.find_record(id).await?;

        let content = match self
            .retry
            .run("Get object", StorageError::is_transient, || {
                self.storage.get_object(&record.storage_key)
            })
            .await
        {
            Ok(content) => content,
            Err(source) => {
                if source.is_not_found() {
                    error!(
                        "Record {} points at missing object {}",
                        record.id, record.storage_key
                    );
                    self.log_inconsistency(ReconciliationItem::dangling(
                        record.id,
                        &record.storage_key,
                        "object missing on download",
                    ))
                    .await;
                }
                return Err(LifecycleError::StorageReadFailed {
                    key: record.storage_key,
                    source,
                });
            }
        };

        let filename = format!("{}{}", record.model_name, self.extension);
        info!("Downloaded record {} as {}", record.id, filename);

        Ok(DownloadedArtifact {
            record,
            filename,
            content,
        })
    }

    /// Compare every record and every object key under `prefix`.
    ///
    /// Findings are appended to the reconciliation log. With `repair`, orphan
    /// objects and dangling records are deleted after re-checking them under
    /// the model's lock, and their log entries are resolved.
    pub async fn reconcile(
        &self,
        prefix: &str,
        repair: bool,
    ) -> Result<ReconcileReport, LifecycleError> {
        info!("Reconciling stores under prefix '{}' (repair={})", prefix, repair);

        // Records first: an object always exists before its record does
        let records = self.all_records(prefix).await?;
        let object_keys = self
            .retry
            .run("List objects", StorageError::is_transient, || {
                self.storage.list_objects(prefix)
            })
            .await
            .map_err(|source| LifecycleError::StorageReadFailed {
                key: prefix.to_string(),
                source,
            })?;

        let object_set: HashSet<&str> = object_keys.iter().map(String::as_str).collect();
        let record_keys: HashSet<&str> = records.iter().map(|r| r.storage_key.as_str()).collect();

        let mut report = ReconcileReport {
            orphan_objects: object_keys
                .iter()
                .filter(|key| !record_keys.contains(key.as_str()))
                .cloned()
                .collect(),
            dangling_records: records
                .iter()
                .filter(|record| !object_set.contains(record.storage_key.as_str()))
                .cloned()
                .collect(),
            repaired: 0,
        };

        for key in &report.orphan_objects {
            warn!("Orphan object {}", key);
            self.log_inconsistency(ReconciliationItem::orphan(key, "found by reconcile"))
                .await;
        }
        for record in &report.dangling_records {
            warn!("Dangling record {} ({})", record.id, record.storage_key);
            self.log_inconsistency(ReconciliationItem::dangling(
                record.id,
                &record.storage_key,
                "found by reconcile",
            ))
            .await;
        }

        if repair {
            for key in &report.orphan_objects {
                if self.repair_orphan(key).await {
                    report.repaired += 1;
                }
            }
            for record in &report.dangling_records {
                if self.repair_dangling(record).await {
                    report.repaired += 1;
                }
            }
        }

        info!(
            "Reconcile finished: {} orphan objects, {} dangling records, {} repaired",
            report.orphan_objects.len(),
            report.dangling_records.len(),
            report.repaired
        );
        Ok(report)
    }

    async fn find_record(&self, id: i64) -> Result<ArtifactRecord, LifecycleError> {
        self.retry
            .run("Fetch record", DatabaseError::is_transient, || {
                self.database.get_record(id)
            })
            .await
            .map_err(LifecycleError::MetadataReadFailed)?
            .ok_or(LifecycleError::NotFound(id))
    }

    /// Object, then record. Caller holds the model's lock.
    async fn remove_version(&self, record: &ArtifactRecord) -> Result<(), LifecycleError> {
        match self
            .retry
            .run("Delete object", StorageError::is_transient, || {
                self.storage.delete_object(&record.storage_key)
            })
            .await
        {
            Ok(()) => debug!("Deleted object {}", record.storage_key),
            Err(StorageError::ObjectNotFound(_)) => {
                warn!("Object {} was already gone", record.storage_key)
            }
            Err(source) => {
                error!("Failed to delete object {}: {}", record.storage_key, source);
                return Err(LifecycleError::StorageDeleteFailed {
                    key: record.storage_key.clone(),
                    source,
                });
            }
        }

        match self
            .retry
            .run("Delete record", DatabaseError::is_transient, || {
                self.database.delete_record(record.id)
            })
            .await
        {
            Ok(()) => Ok(()),
            Err(DatabaseError::RecordNotFound(id)) => Err(LifecycleError::NotFound(id)),
            Err(source) => {
                error!("Failed to delete record {}: {}", record.id, source);
                self.log_inconsistency(ReconciliationItem::dangling(
                    record.id,
                    &record.storage_key,
                    format!("record delete failed after object delete: {}", source),
                ))
                .await;
                Err(LifecycleError::MetadataDeleteFailed {
                    id: record.id,
                    source,
                })
            }
        }
    }

    async fn compensate_orphan(&self, storage_key: &str, cause: &DatabaseError) {
        match self
            .retry
            .run("Compensating delete", StorageError::is_transient, || {
                self.storage.delete_object(storage_key)
            })
            .await
        {
            Ok(()) | Err(StorageError::ObjectNotFound(_)) => {
                info!("Removed unrecorded object {}", storage_key)
            }
            Err(e) => {
                error!(
                    "Compensating delete of {} failed, leaving an orphan: {}",
                    storage_key, e
                );
                self.log_inconsistency(ReconciliationItem::orphan(
                    storage_key,
                    format!("record insert failed: {}; compensating delete failed: {}", cause, e),
                ))
                .await;
            }
        }
    }

    async fn log_inconsistency(&self, item: ReconciliationItem) {
        let kind = item.kind;
        let storage_key = item.storage_key.clone();
        match self.reconciliation_log.record_item(item).await {
            Ok(true) => warn!("Logged {} for {}", kind.as_str(), storage_key),
            Ok(false) => debug!("{} for {} is already logged", kind.as_str(), storage_key),
            Err(e) => error!(
                "Failed to log {} for {}: {}",
                kind.as_str(),
                storage_key,
                e
            ),
        }
    }

    async fn resolve_logged(&self, kind: InconsistencyKind, storage_key: &str) {
        if let Err(e) = self
            .reconciliation_log
            .resolve_key(kind, storage_key, Utc::now())
            .await
        {
            error!("Failed to resolve {} for {}: {}", kind.as_str(), storage_key, e);
        }
    }

    async fn all_records(&self, prefix: &str) -> Result<Vec<ArtifactRecord>, LifecycleError> {
        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .retry
                .run("Fetch record page", DatabaseError::is_transient, || {
                    self.database.get_page(offset, RECONCILE_PAGE_SIZE)
                })
                .await
                .map_err(LifecycleError::MetadataReadFailed)?;

            let fetched = page.records.len() as u64;
            records.extend(
                page.records
                    .into_iter()
                    .filter(|record| record.storage_key.starts_with(prefix)),
            );

            offset += fetched;
            if fetched < RECONCILE_PAGE_SIZE || offset >= page.total_count {
                break;
            }
        }
        Ok(records)
    }

    fn model_name_for_key(&self, storage_key: &str) -> String {
        match storage_key.split_once('/') {
            Some((model_name, _)) => model_name.to_string(),
            None => model_name_from_filename(storage_key, &self.extension),
        }
    }

    async fn repair_orphan(&self, storage_key: &str) -> bool {
        let _guard = self.locks.acquire(&self.model_name_for_key(storage_key)).await;

        match self.database.get_record_by_key(storage_key).await {
            Ok(Some(record)) => {
                debug!("{} is now owned by record {}", storage_key, record.id);
                self.resolve_logged(InconsistencyKind::OrphanObject, storage_key)
                    .await;
                return false;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Skipping repair of {}: {}", storage_key, e);
                return false;
            }
        }

        match self
            .retry
            .run("Delete orphan object", StorageError::is_transient, || {
                self.storage.delete_object(storage_key)
            })
            .await
        {
            Ok(()) | Err(StorageError::ObjectNotFound(_)) => {
                info!("Deleted orphan object {}", storage_key);
                self.resolve_logged(InconsistencyKind::OrphanObject, storage_key)
                    .await;
                true
            }
            Err(e) => {
                warn!("Failed to delete orphan object {}: {}", storage_key, e);
                false
            }
        }
    }

    async fn repair_dangling(&self, record: &ArtifactRecord) -> bool {
        let _guard = self.locks.acquire(&record.model_name).await;

        match self.storage.list_objects(&record.storage_key).await {
            Ok(keys) if keys.iter().any(|key| *key == record.storage_key) => {
                debug!("Object {} reappeared", record.storage_key);
                self.resolve_logged(InconsistencyKind::DanglingRecord, &record.storage_key)
                    .await;
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Skipping repair of record {}: {}", record.id, e);
                return false;
            }
        }

        match self
            .retry
            .run("Delete dangling record", DatabaseError::is_transient, || {
                self.database.delete_record(record.id)
            })
            .await
        {
            Ok(()) | Err(DatabaseError::RecordNotFound(_)) => {
                info!("Deleted dangling record {}", record.id);
                self.resolve_logged(InconsistencyKind::DanglingRecord, &record.storage_key)
                    .await;
                true
            }
            Err(e) => {
                warn!("Failed to delete dangling record {}: {}", record.id, e);
                false
            }
        }
    }
}
