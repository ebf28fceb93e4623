use crate::db::database::MetadataStore;
use crate::db::error::DatabaseError;
use crate::db::models::{ArtifactRecord, NewArtifactRecord, RecordPage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct FakeState {
    records: BTreeMap<i64, ArtifactRecord>,
    next_id: i64,
    fail_inserts: usize,
    fail_deletes: usize,
    fail_reads: usize,
    rival_inserts: usize,
    lost_acks: usize,
}

/// A fake in-memory implementation of the MetadataStore trait for testing
#[derive(Clone, Default)]
pub struct FakeDatabase {
    state: Arc<RwLock<FakeState>>,
}

#[allow(dead_code)]
impl FakeDatabase {
    /// Create a new empty FakeDatabase
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with a chosen creation time, bypassing failure injection
    pub fn fake_add_record(
        &self,
        record: NewArtifactRecord,
        created_at: DateTime<Utc>,
    ) -> ArtifactRecord {
        let mut state = self.state.write().unwrap();
        Self::store(&mut state, record, created_at)
    }

    /// Make the next `times` inserts fail with `Unavailable`
    pub fn fake_fail_inserts(&self, times: usize) {
        self.state.write().unwrap().fail_inserts = times;
    }

    /// Make the next `times` deletes fail with `Unavailable`
    pub fn fake_fail_deletes(&self, times: usize) {
        self.state.write().unwrap().fail_deletes = times;
    }

    /// Make the next `times` lookups by id, key, name or page fail with `Unavailable`
    pub fn fake_fail_reads(&self, times: usize) {
        self.state.write().unwrap().fail_reads = times;
    }

    /// Make the next `times` inserts lose a race: another writer commits the
    /// same key first and the insert fails with `Conflict`
    pub fn fake_rival_inserts(&self, times: usize) {
        self.state.write().unwrap().rival_inserts = times;
    }

    /// Make the next `times` inserts commit but report `Unavailable`, as when
    /// the connection drops before the acknowledgement arrives
    pub fn fake_lose_insert_acks(&self, times: usize) {
        self.state.write().unwrap().lost_acks = times;
    }

    pub fn fake_record_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    pub fn fake_all_records(&self) -> Vec<ArtifactRecord> {
        self.state.read().unwrap().records.values().cloned().collect()
    }

    fn store(
        state: &mut FakeState,
        record: NewArtifactRecord,
        created_at: DateTime<Utc>,
    ) -> ArtifactRecord {
        state.next_id += 1;
        let stored = ArtifactRecord {
            id: state.next_id,
            model_name: record.model_name,
            version: record.version,
            storage_key: record.storage_key,
            file_size_bytes: record.file_size_bytes,
            created_at,
        };
        state.records.insert(stored.id, stored.clone());
        stored
    }

    fn consume(counter: &mut usize, what: &str) -> Result<(), DatabaseError> {
        if *counter > 0 {
            *counter -= 1;
            return Err(DatabaseError::Unavailable(format!("injected {} outage", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FakeDatabase {
    async fn insert_record(
        &self,
        record: NewArtifactRecord,
    ) -> Result<ArtifactRecord, DatabaseError> {
        let mut state = self.state.write().unwrap();
        Self::consume(&mut state.fail_inserts, "insert")?;

        if state.rival_inserts > 0 {
            state.rival_inserts -= 1;
            let rival = NewArtifactRecord {
                file_size_bytes: record.file_size_bytes + 1,
                ..record.clone()
            };
            Self::store(&mut state, rival, Utc::now());
        }

        if state
            .records
            .values()
            .any(|existing| existing.storage_key == record.storage_key)
        {
            return Err(DatabaseError::Conflict(format!(
                "s3_key {} already exists",
                record.storage_key
            )));
        }

        let stored = Self::store(&mut state, record, Utc::now());
        Self::consume(&mut state.lost_acks, "insert acknowledgement")?;
        Ok(stored)
    }

    async fn get_record(&self, id: i64) -> Result<Option<ArtifactRecord>, DatabaseError> {
        let mut state = self.state.write().unwrap();
        Self::consume(&mut state.fail_reads, "read")?;
        Ok(state.records.get(&id).cloned())
    }

    async fn get_record_by_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<ArtifactRecord>, DatabaseError> {
        let mut state = self.state.write().unwrap();
        Self::consume(&mut state.fail_reads, "read")?;
        Ok(state
            .records
            .values()
            .find(|record| record.storage_key == storage_key)
            .cloned())
    }

    async fn get_records_by_name(
        &self,
        model_name: &str,
    ) -> Result<Vec<ArtifactRecord>, DatabaseError> {
        let mut state = self.state.write().unwrap();
        Self::consume(&mut state.fail_reads, "read")?;
        Ok(state
            .records
            .values()
            .filter(|record| record.model_name == model_name)
            .cloned()
            .collect())
    }

    async fn delete_record(&self, id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state.write().unwrap();
        Self::consume(&mut state.fail_deletes, "delete")?;

        match state.records.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DatabaseError::RecordNotFound(id)),
        }
    }

    async fn get_page(&self, offset: u64, limit: u64) -> Result<RecordPage, DatabaseError> {
        let mut state = self.state.write().unwrap();
        Self::consume(&mut state.fail_reads, "read")?;

        // Sort to match the PostgreSQL ORDER BY created_at DESC, id ASC
        let mut all: Vec<ArtifactRecord> = state.records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total_count = all.len() as u64;
        let records = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(RecordPage {
            records,
            total_count,
        })
    }
}
