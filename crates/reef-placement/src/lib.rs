//! Consistent hashing ring for deterministic key placement.
//!
//! This crate implements a consistent hash ring that maps arbitrary string
//! keys to shard IDs. Each physical shard owns a fixed number of virtual
//! nodes (vnodes) on a `u64` ring, positioned at
//! `sha256("{node_id}:{vnode_index}")` truncated to its first 8 bytes.
//! A key belongs to the first vnode strictly clockwise of its own hash.
//!
//! Adding or removing one shard only moves the keys owned by that shard's
//! vnodes (about `1/N` of the keyspace), never a full remap.

mod ring;

pub use ring::{AddOutcome, DEFAULT_VNODES, HashRing, Relocation, RemoveOutcome, hash};
