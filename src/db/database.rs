use crate::db::error::DatabaseError;
use crate::db::models::{ArtifactRecord, NewArtifactRecord, RecordPage};
use async_trait::async_trait;
use std::sync::Arc;

/// Durable record of artifact identity, storage key, size and creation time
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Insert a new record. Fails with `Conflict` when the storage key is taken.
    async fn insert_record(&self, record: NewArtifactRecord)
        -> Result<ArtifactRecord, DatabaseError>;

    /// Look a record up by id
    async fn get_record(&self, id: i64) -> Result<Option<ArtifactRecord>, DatabaseError>;

    /// Look a record up by its object-store key
    async fn get_record_by_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<ArtifactRecord>, DatabaseError>;

    /// All records for one model name, in no particular order
    async fn get_records_by_name(
        &self,
        model_name: &str,
    ) -> Result<Vec<ArtifactRecord>, DatabaseError>;

    /// Delete a record by id. Fails with `RecordNotFound` when absent.
    async fn delete_record(&self, id: i64) -> Result<(), DatabaseError>;

    /// Records ordered by `created_at` descending then `id` ascending
    ///
    /// * `offset` - Number of records to skip
    /// * `limit` - Maximum number of records to return
    async fn get_page(&self, offset: u64, limit: u64) -> Result<RecordPage, DatabaseError>;
}

/// Implementation of MetadataStore trait for Arc<T> where T implements MetadataStore
///
/// This allows sharing one pool-backed store between the lifecycle manager
/// and the catalog service.
#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    async fn insert_record(
        &self,
        record: NewArtifactRecord,
    ) -> Result<ArtifactRecord, DatabaseError> {
        (**self).insert_record(record).await
    }

    async fn get_record(&self, id: i64) -> Result<Option<ArtifactRecord>, DatabaseError> {
        (**self).get_record(id).await
    }

    async fn get_record_by_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<ArtifactRecord>, DatabaseError> {
        (**self).get_record_by_key(storage_key).await
    }

    async fn get_records_by_name(
        &self,
        model_name: &str,
    ) -> Result<Vec<ArtifactRecord>, DatabaseError> {
        (**self).get_records_by_name(model_name).await
    }

    async fn delete_record(&self, id: i64) -> Result<(), DatabaseError> {
        (**self).delete_record(id).await
    }

    async fn get_page(&self, offset: u64, limit: u64) -> Result<RecordPage, DatabaseError> {
        (**self).get_page(offset, limit).await
    }
}
