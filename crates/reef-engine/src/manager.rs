//! [`ShardManager`]: routes keys across a fixed set of shards.
//!
//! Each shard is an independent [`KvStore`] with its own lock, so operations
//! on different shards proceed in parallel. The ring is only written while
//! the manager initializes; afterwards every routed call takes a read lock.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use reef_placement::{AddOutcome, DEFAULT_VNODES, HashRing};
use reef_store::{KvStore, MemoryStore, StorageEngine, StoreError};
use reef_types::{NodeId, StorageBackend};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::EngineError;

type Result<T> = std::result::Result<T, EngineError>;

/// Configuration for creating a [`ShardManager`].
#[derive(Debug, Clone)]
pub struct ShardManagerConfig {
    /// Shard identifiers, initialized in this order.
    pub shard_ids: Vec<NodeId>,
    /// Directory holding one `<shard_id>.wal` file per shard.
    pub data_dir: PathBuf,
    /// Virtual nodes per shard in the placement ring.
    pub vnodes_per_node: u16,
    /// Storage backend for every shard.
    pub backend: StorageBackend,
}

impl ShardManagerConfig {
    /// Config for `count` shards named `shard-0` .. `shard-{count-1}`.
    pub fn with_shard_count(count: usize, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            shard_ids: (0..count).map(|i| NodeId::new(format!("shard-{i}"))).collect(),
            data_dir: data_dir.into(),
            vnodes_per_node: DEFAULT_VNODES,
            backend: StorageBackend::default(),
        }
    }
}

impl Default for ShardManagerConfig {
    fn default() -> Self {
        Self::with_shard_count(3, "data")
    }
}

/// Lifecycle of a [`ShardManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Point-in-time statistics across all shards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    /// Sum of every shard's key count.
    pub total_keys: usize,
    /// Number of shards in the ring.
    pub num_shards: usize,
    /// Key count per shard.
    pub shards: BTreeMap<NodeId, usize>,
    /// Ring positions owned by each shard.
    pub vnodes_per_shard: BTreeMap<NodeId, usize>,
}

/// Routes key operations to per-shard stores through a consistent hash ring.
///
/// Shared by concurrent request handlers behind an `Arc`.
pub struct ShardManager {
    config: ShardManagerConfig,
    state: Mutex<ManagerState>,
    ring: RwLock<HashRing>,
    shards: RwLock<BTreeMap<NodeId, Arc<dyn KvStore>>>,
}

impl ShardManager {
    /// Create a manager. Performs no I/O; call [`initialize`](Self::initialize).
    pub fn new(config: ShardManagerConfig) -> Self {
        let ring = HashRing::new(config.vnodes_per_node);
        Self {
            config,
            state: Mutex::new(ManagerState::Uninitialized),
            ring: RwLock::new(ring),
            shards: RwLock::new(BTreeMap::new()),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ShardManagerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ManagerState {
        *self.state.lock().expect("lock poisoned")
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open every shard, replay its log and add it to the ring.
    ///
    /// Only valid from `Uninitialized`. On failure every shard opened so far
    /// is closed and the manager ends up `Closed`.
    pub async fn initialize(&self) -> Result<()> {
        self.transition(ManagerState::Uninitialized, ManagerState::Initializing)?;

        match self.open_shards().await {
            Ok(total_keys) => {
                let distribution = self.ring.read().expect("lock poisoned").get_distribution();
                self.set_state(ManagerState::Ready);
                info!(
                    shards = distribution.len(),
                    total_keys,
                    ?distribution,
                    "shard manager ready"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "shard manager initialization failed");
                let failures = self.close_all().await;
                for (id, err) in &failures {
                    warn!(shard = %id, error = %err, "failed to close shard after init failure");
                }
                self.set_state(ManagerState::Closed);
                Err(e)
            }
        }
    }

    /// Open and register every configured shard. Returns the number of keys
    /// recovered across all of them.
    async fn open_shards(&self) -> Result<usize> {
        if self.config.backend == StorageBackend::Wal {
            tokio::fs::create_dir_all(&self.config.data_dir).await?;
        }

        for id in &self.config.shard_ids {
            if self.shards.read().expect("lock poisoned").contains_key(id) {
                warn!(shard = %id, "duplicate shard id in config, skipping");
                continue;
            }

            let store: Arc<dyn KvStore> = match self.config.backend {
                StorageBackend::Wal => {
                    let path = self.config.data_dir.join(format!("{id}.wal"));
                    Arc::new(StorageEngine::new(path))
                }
                StorageBackend::Memory => Arc::new(MemoryStore::new()),
            };
            // Registered before initialize so a failure still closes it.
            self.shards
                .write()
                .expect("lock poisoned")
                .insert(id.clone(), store.clone());
            store.initialize().await?;

            if let AddOutcome::Added { vnodes } =
                self.ring.write().expect("lock poisoned").add_node(id.clone())
            {
                debug!(shard = %id, vnodes, "shard added to ring");
            }
        }

        let mut total_keys = 0;
        for (_, store) in self.snapshot() {
            total_keys += store.size().await?;
        }
        Ok(total_keys)
    }

    /// Close every shard. Idempotent: calling it on a closed manager is a
    /// no-op. All shards are attempted even if some fail.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            match *state {
                ManagerState::Closed => return Ok(()),
                ManagerState::Initializing => return Err(EngineError::InvalidState(*state)),
                ManagerState::Uninitialized | ManagerState::Ready => {
                    *state = ManagerState::Closed;
                }
            }
        }

        let failures = self.close_all().await;
        if failures.is_empty() {
            info!("shard manager closed");
            Ok(())
        } else {
            for (id, err) in &failures {
                error!(shard = %id, error = %err, "failed to close shard");
            }
            Err(EngineError::Close(failures))
        }
    }

    async fn close_all(&self) -> Vec<(NodeId, StoreError)> {
        let shards = std::mem::take(&mut *self.shards.write().expect("lock poisoned"));
        let mut failures = Vec::new();
        for (id, store) in shards {
            if let Err(e) = store.close().await {
                failures.push((id, e));
            }
        }
        failures
    }

    fn transition(&self, from: ManagerState, to: ManagerState) -> Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if *state != from {
            return Err(EngineError::InvalidState(*state));
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: ManagerState) {
        *self.state.lock().expect("lock poisoned") = to;
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ManagerState::Ready => Ok(()),
            other => Err(EngineError::NotReady(other)),
        }
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    /// The shard that owns `key`.
    pub fn shard_for(&self, key: &str) -> Result<NodeId> {
        self.ensure_ready()?;
        let ring = self.ring.read().expect("lock poisoned");
        ring.get_node(key).cloned().ok_or(EngineError::NoShards)
    }

    fn route(&self, key: &str) -> Result<(NodeId, Arc<dyn KvStore>)> {
        let id = self.shard_for(key)?;
        let store = self
            .shards
            .read()
            .expect("lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownShard(id.clone()))?;
        Ok((id, store))
    }

    fn snapshot(&self) -> Vec<(NodeId, Arc<dyn KvStore>)> {
        self.shards
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(id, store)| (id.clone(), store.clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Key operations
    // ------------------------------------------------------------------

    /// Retrieve a value. `None` if the key is absent.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let (id, store) = self.route(key)?;
        debug!(key, shard = %id, "get");
        Ok(store.get(key).await?)
    }

    /// Insert or overwrite a key. Durable when it returns.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let (id, store) = self.route(key)?;
        debug!(key, shard = %id, "put");
        Ok(store.put(key, value).await?)
    }

    /// Remove a key. Returns `false` if it was absent.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let (id, store) = self.route(key)?;
        debug!(key, shard = %id, "delete");
        Ok(store.delete(key).await?)
    }

    /// Whether a key is present.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let (_, store) = self.route(key)?;
        Ok(store.exists(key).await?)
    }

    /// Total keys across all shards. Shards are counted one after another,
    /// so concurrent writes may or may not be reflected.
    pub async fn size(&self) -> Result<usize> {
        self.ensure_ready()?;
        let mut total = 0;
        for (_, store) in self.snapshot() {
            total += store.size().await?;
        }
        Ok(total)
    }

    /// Per-shard key counts and ring distribution.
    pub async fn get_stats(&self) -> Result<ShardStats> {
        self.ensure_ready()?;
        let vnodes_per_shard = self.ring.read().expect("lock poisoned").get_distribution();

        let mut shards = BTreeMap::new();
        for (id, store) in self.snapshot() {
            shards.insert(id, store.size().await?);
        }

        Ok(ShardStats {
            total_keys: shards.values().sum(),
            num_shards: vnodes_per_shard.len(),
            shards,
            vnodes_per_shard,
        })
    }
}
