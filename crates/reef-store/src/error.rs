//! Error types for shard storage operations.

use reef_wal::WalError;

/// Errors that can occur during shard storage operations.
///
/// A missing key is not an error: reads return `None` and deletes `false`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The write-ahead log failed.
    #[error("wal error: {0}")]
    Wal(#[from] WalError),

    /// An operation was issued before `initialize`.
    #[error("store used before initialize")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("store already initialized")]
    AlreadyInitialized,

    /// An operation was issued after `close`.
    #[error("store is closed")]
    Closed,

    /// The task running a mutation panicked or was aborted.
    #[error("commit task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
