//! Shard manager tying the placement ring to per-shard storage.
//!
//! The [`ShardManager`] owns one [`KvStore`](reef_store::KvStore) per shard
//! and a [`HashRing`](reef_placement::HashRing) over their ids. Every key
//! operation is routed through the ring to exactly one shard.
//!
//! Protocol adapters (the HTTP API, the daemon's offline `stats` command)
//! talk only to the manager.

pub mod error;
pub mod manager;

pub use error::EngineError;
pub use manager::{ManagerState, ShardManager, ShardManagerConfig, ShardStats};
pub use reef_placement::DEFAULT_VNODES;

#[cfg(test)]
mod tests;
