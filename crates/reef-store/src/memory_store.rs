//! In-memory shard storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreError;
use crate::traits::KvStore;

/// Volatile shard store backed by a `RwLock<HashMap>`.
///
/// Useful for testing and for managers configured with the memory backend.
/// Follows the same lifecycle as [`StorageEngine`](crate::StorageEngine):
/// `initialize` before use, and `close` drops the contents.
pub struct MemoryStore {
    state: RwLock<MemState>,
}

enum MemState {
    Uninitialized,
    Ready(HashMap<String, String>),
    Closed,
}

impl MemState {
    fn map(&self) -> Result<&HashMap<String, String>, StoreError> {
        match self {
            Self::Ready(map) => Ok(map),
            Self::Uninitialized => Err(StoreError::NotInitialized),
            Self::Closed => Err(StoreError::Closed),
        }
    }

    fn map_mut(&mut self) -> Result<&mut HashMap<String, String>, StoreError> {
        match self {
            Self::Ready(map) => Ok(map),
            Self::Uninitialized => Err(StoreError::NotInitialized),
            Self::Closed => Err(StoreError::Closed),
        }
    }
}

impl MemoryStore {
    /// Create a store. Call [`KvStore::initialize`] before use.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState::Uninitialized),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        match *state {
            MemState::Uninitialized => {
                *state = MemState::Ready(HashMap::new());
                Ok(())
            }
            MemState::Ready(_) => Err(StoreError::AlreadyInitialized),
            MemState::Closed => Err(StoreError::Closed),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.map()?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        let map = state.map_mut()?;
        debug!(key, size = value.len(), "storing key in memory");
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        let removed = state.map_mut()?.remove(key).is_some();
        if removed {
            debug!(key, "deleted key from memory");
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.map()?.contains_key(key))
    }

    async fn size(&self) -> Result<usize, StoreError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.map()?.len())
    }

    async fn close(&self) -> Result<(), StoreError> {
        *self.state.write().expect("lock poisoned") = MemState::Closed;
        Ok(())
    }
}
