use crate::s3::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Capability interface over a key/value blob store
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Write an object, replacing any existing object under the same key.
    /// Readers never observe a partially written object.
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Get an object by its key
    ///
    /// * `key` - The object key to retrieve
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Delete an object. Fails with `ObjectNotFound` when the key is absent so
    /// callers can tell "already gone" from a real failure.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// List every key starting with `prefix`
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Implementation of ObjectStore trait for Arc<T> where T implements ObjectStore
///
/// This allows sharing one client between the lifecycle manager and tests.
#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        (**self).put_object(key, data).await
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        (**self).get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).list_objects(prefix).await
    }
}
