//! Durable shard store: an in-memory map in front of a write-ahead log.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reef_types::WalOp;
use reef_wal::WriteAheadLog;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::KvStore;

/// Lifecycle of a [`StorageEngine`].
enum EngineState {
    /// Constructed, nothing opened yet.
    Uninitialized,
    /// Log open and replayed into `map`.
    Ready {
        wal: WriteAheadLog,
        map: HashMap<String, String>,
    },
    Closed,
}

/// A pending mutation, logged before it is applied.
enum Mutation {
    Put { key: String, value: String },
    Delete { key: String },
}

macro_rules! ready {
    ($state:expr) => {
        match $state {
            EngineState::Ready { wal, map } => (wal, map),
            EngineState::Uninitialized => return Err(StoreError::NotInitialized),
            EngineState::Closed => return Err(StoreError::Closed),
        }
    };
}

/// WAL-backed store for one shard.
///
/// A single async mutex guards both the log and the map, so a mutation's
/// append and its in-memory application are atomic with respect to every
/// other operation on this shard. Distinct shards never contend.
///
/// Mutations run on their own task once the lock is taken. A caller that
/// stops waiting does not stop the write: it is logged and applied all the
/// same, so the map never drifts from the log.
pub struct StorageEngine {
    wal_path: PathBuf,
    state: Arc<Mutex<EngineState>>,
}

impl StorageEngine {
    /// Create an engine for the log at `wal_path`. Performs no I/O; call
    /// [`KvStore::initialize`] before use.
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            state: Arc::new(Mutex::new(EngineState::Uninitialized)),
        }
    }

    /// Create and initialize an engine in one step.
    pub async fn open(wal_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let engine = Self::new(wal_path);
        engine.initialize().await?;
        Ok(engine)
    }

    /// Path of this shard's log file.
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Close the log but leave the engine Ready, so the next mutation fails
    /// at the append.
    #[cfg(test)]
    pub(crate) async fn sever_wal(&self) {
        if let EngineState::Ready { wal, .. } = &*self.state.lock().await {
            wal.close().await.expect("close wal");
        }
    }

    /// Take the shard lock, then finish `mutation` on a spawned task.
    async fn submit(&self, mutation: Mutation) -> Result<bool, StoreError> {
        let state = Arc::clone(&self.state).lock_owned().await;
        tokio::spawn(apply(state, mutation)).await?
    }
}

/// Apply one mutation under the held shard lock. Returns `false` for a
/// delete of an absent key, which is not logged.
async fn apply(
    mut state: OwnedMutexGuard<EngineState>,
    mutation: Mutation,
) -> Result<bool, StoreError> {
    let (wal, map) = ready!(&mut *state);
    if let Mutation::Delete { key } = &mutation
        && !map.contains_key(key)
    {
        return Ok(false);
    }
    commit(wal, map, mutation).await?;
    Ok(true)
}

/// Two-phase commit of one mutation: make it durable, then make it visible.
///
/// If the append fails the map is left untouched and the error is returned,
/// so readers never observe a value the log does not hold.
async fn commit(
    wal: &WriteAheadLog,
    map: &mut HashMap<String, String>,
    mutation: Mutation,
) -> Result<(), StoreError> {
    // Phase 1: durable.
    match &mutation {
        Mutation::Put { key, value } => wal.append(WalOp::Put, key, Some(value.as_str())).await?,
        Mutation::Delete { key } => wal.append(WalOp::Delete, key, None).await?,
    }

    // Phase 2: visible.
    match mutation {
        Mutation::Put { key, value } => {
            map.insert(key, value);
        }
        Mutation::Delete { key } => {
            map.remove(&key);
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl KvStore for StorageEngine {
    async fn initialize(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match &*state {
            EngineState::Uninitialized => {}
            EngineState::Ready { .. } => return Err(StoreError::AlreadyInitialized),
            EngineState::Closed => return Err(StoreError::Closed),
        }

        let wal = WriteAheadLog::open(&self.wal_path).await?;
        let (map, report) = wal.replay_with_report().await?;
        info!(
            path = %self.wal_path.display(),
            keys = map.len(),
            records = report.records,
            skipped = report.skipped,
            "storage engine initialized"
        );
        *state = EngineState::Ready { wal, map };
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        let (_, map) = ready!(&mut *state);
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.submit(Mutation::Put {
            key: key.to_string(),
            value: value.to_string(),
        })
        .await?;
        debug!(key, size = value.len(), "put");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self
            .submit(Mutation::Delete {
                key: key.to_string(),
            })
            .await?;
        if removed {
            debug!(key, "deleted");
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let (_, map) = ready!(&mut *state);
        Ok(map.contains_key(key))
    }

    async fn size(&self) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let (_, map) = ready!(&mut *state);
        Ok(map.len())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, EngineState::Closed) {
            EngineState::Ready { wal, map } => {
                wal.close().await?;
                info!(path = %self.wal_path.display(), keys = map.len(), "storage engine closed");
            }
            EngineState::Uninitialized | EngineState::Closed => {}
        }
        Ok(())
    }
}
