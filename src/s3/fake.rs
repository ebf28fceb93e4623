use crate::s3::error::StorageError;
use crate::s3::storage::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Failure that a `FakeStorage` call can be told to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Unavailable,
    AccessDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Put,
    Get,
    Delete,
    List,
}

/// `FakeStorage` is an in-memory implementation of the `ObjectStore` trait for testing purposes.
/// Failures can be scheduled per operation to exercise retry and compensation paths.
#[derive(Clone, Default)]
pub struct FakeStorage {
    data: Arc<Mutex<BTreeMap<String, Bytes>>>,
    failures: Arc<Mutex<HashMap<Operation, (InjectedFailure, usize)>>>,
    put_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeStorage {
    /// Create a new empty FakeStorage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` put calls fail with `failure`
    pub async fn fake_fail_puts(&self, failure: InjectedFailure, times: usize) {
        self.schedule(Operation::Put, failure, times).await;
    }

    /// Make the next `times` get calls fail with `failure`
    pub async fn fake_fail_gets(&self, failure: InjectedFailure, times: usize) {
        self.schedule(Operation::Get, failure, times).await;
    }

    /// Make the next `times` delete calls fail with `failure`
    pub async fn fake_fail_deletes(&self, failure: InjectedFailure, times: usize) {
        self.schedule(Operation::Delete, failure, times).await;
    }

    /// Make the next `times` list calls fail with `failure`
    pub async fn fake_fail_lists(&self, failure: InjectedFailure, times: usize) {
        self.schedule(Operation::List, failure, times).await;
    }

    /// Insert an object directly, bypassing failure injection
    pub async fn fake_add_object(&self, key: &str, data: Bytes) {
        self.data.lock().await.insert(key.to_string(), data);
    }

    /// Remove an object directly, simulating an out-of-band deletion
    pub async fn fake_remove_object(&self, key: &str) -> bool {
        self.data.lock().await.remove(key).is_some()
    }

    pub async fn fake_has_object(&self, key: &str) -> bool {
        self.data.lock().await.contains_key(key)
    }

    pub async fn fake_object_count(&self) -> usize {
        self.data.lock().await.len()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    async fn schedule(&self, operation: Operation, failure: InjectedFailure, times: usize) {
        self.failures
            .lock()
            .await
            .insert(operation, (failure, times));
    }

    async fn take_failure(&self, operation: Operation, key: &str) -> Result<(), StorageError> {
        let mut failures = self.failures.lock().await;
        let Some((failure, remaining)) = failures.get_mut(&operation) else {
            return Ok(());
        };
        if *remaining == 0 {
            return Ok(());
        }
        *remaining -= 1;

        Err(match failure {
            InjectedFailure::Unavailable => {
                StorageError::Unavailable(key.to_string(), "injected outage".to_string())
            }
            InjectedFailure::AccessDenied => {
                StorageError::AccessDenied(key.to_string(), "injected denial".to_string())
            }
        })
    }
}

#[async_trait]
impl ObjectStore for FakeStorage {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(Operation::Put, key).await?;

        self.data.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(Operation::Get, key).await?;

        let data = self.data.lock().await;
        match data.get(key) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(StorageError::ObjectNotFound(key.to_string())),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(Operation::Delete, key).await?;

        let mut data = self.data.lock().await;
        if data.remove(key).is_some() {
            Ok(())
        } else {
            Err(StorageError::ObjectNotFound(key.to_string()))
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.take_failure(Operation::List, prefix).await?;

        let data = self.data.lock().await;
        Ok(data
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
