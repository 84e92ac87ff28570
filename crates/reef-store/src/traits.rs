//! Core trait for shard storage.

use crate::error::StoreError;

/// Trait for one shard's key-value map.
///
/// All operations on a single store are linearizable. Implementations must
/// be `Send + Sync` so one store can be shared by concurrent request tasks.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Load any persisted state. Must be called once before other operations.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Retrieve a value. Returns `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a key.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Returns `false` if it was absent.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Number of keys stored.
    async fn size(&self) -> Result<usize, StoreError>;

    /// Release resources. Idempotent; later operations fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}
