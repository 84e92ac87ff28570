//! Per-shard key-value storage.
//!
//! This crate defines the [`KvStore`] trait that the shard manager drives,
//! along with two concrete backends:
//!
//! - [`StorageEngine`]: in-memory map made durable by a write-ahead log.
//!   Every mutation is logged and synced before it becomes visible.
//! - [`MemoryStore`]: volatile map with the same semantics and no log.

mod engine;
mod error;
mod memory_store;
mod traits;

pub use engine::StorageEngine;
pub use error::StoreError;
pub use memory_store::MemoryStore;
pub use traits::KvStore;
