//! Error types for the write-ahead log.

/// Errors that can occur while appending to or replaying a log.
///
/// Corrupt records are not errors: replay skips them and counts them in
/// its [`ReplayReport`](crate::ReplayReport).
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A PUT was appended without a value.
    #[error("put record for key {key:?} has no value")]
    MissingValue {
        /// The key of the rejected record.
        key: String,
    },

    /// The log has been closed.
    #[error("write-ahead log is closed")]
    Closed,
}
