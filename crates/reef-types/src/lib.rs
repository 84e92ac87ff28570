//! Shared types and identifiers for Reef.
//!
//! This crate defines the core types used across the Reef workspace:
//! the shard identifier ([`NodeId`]), the write-ahead log record
//! ([`WalRecord`], [`WalOp`]) and the storage backend selector
//! ([`StorageBackend`]).

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

/// Identifier of a physical shard, e.g. `"shard-0"`.
///
/// Opaque to the placement ring: it is only hashed (with a vnode suffix)
/// and compared. The shard manager also uses it to name the shard's log file.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Write-ahead log records
// ---------------------------------------------------------------------------

/// A mutating operation recorded in the write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalOp {
    /// Insert or overwrite a key.
    Put,
    /// Remove a key.
    Delete,
}

impl WalOp {
    /// The tag written to the `op` field of a log line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for WalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a shard's write-ahead log.
///
/// Serialized as a single JSON object:
/// `{"op":"PUT","key":"user:1","value":"alice","ts":1705612800}`.
/// `value` is present iff `op` is [`WalOp::Put`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// The operation.
    pub op: WalOp,
    /// The key being mutated.
    pub key: String,
    /// The new value (PUT only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Seconds since the Unix epoch at append time.
    pub ts: u64,
}

impl WalRecord {
    /// Build a PUT record.
    pub fn put(key: impl Into<String>, value: impl Into<String>, ts: u64) -> Self {
        Self {
            op: WalOp::Put,
            key: key.into(),
            value: Some(value.into()),
            ts,
        }
    }

    /// Build a DELETE record.
    pub fn delete(key: impl Into<String>, ts: u64) -> Self {
        Self {
            op: WalOp::Delete,
            key: key.into(),
            value: None,
            ts,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Storage backend selection for every shard of a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Durable: one write-ahead log file per shard.
    #[default]
    Wal,
    /// Volatile: nothing touches disk.
    Memory,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
