//! Error types for the shard manager.

use reef_store::StoreError;
use reef_types::NodeId;

use crate::manager::ManagerState;

/// Errors that can occur during shard manager operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A shard's store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The ring is empty, so no key can be routed.
    #[error("no shards configured")]
    NoShards,

    /// A key operation was issued outside the `Ready` state.
    #[error("shard manager not ready (state: {0})")]
    NotReady(ManagerState),

    /// A lifecycle call was issued in a state that does not allow it.
    #[error("invalid shard manager state for this call: {0}")]
    InvalidState(ManagerState),

    /// The ring routed to a shard the manager holds no store for.
    #[error("unknown shard: {0}")]
    UnknownShard(NodeId),

    /// One or more shards failed to close. Every shard was still attempted.
    #[error("failed to close {} shard(s)", .0.len())]
    Close(Vec<(NodeId, StoreError)>),

    /// Filesystem error preparing the data directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
