//! Consistent hashing ring implementation.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use reef_types::NodeId;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Virtual nodes per physical node when none is configured.
pub const DEFAULT_VNODES: u16 = 150;

/// Result of [`HashRing::add_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The node was registered with this many vnodes.
    Added {
        /// Number of vnode positions inserted.
        vnodes: usize,
    },
    /// The node was already on the ring; nothing changed.
    AlreadyPresent,
}

/// Result of [`HashRing::remove_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The node and its vnodes were removed.
    Removed {
        /// Number of vnode positions removed.
        vnodes: usize,
    },
    /// The node was not on the ring; nothing changed.
    NotFound,
}

/// A key whose owner differs between two ring states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// The key that must move.
    pub key: String,
    /// The node that owns it in the old ring.
    pub from: NodeId,
    /// The node that owns it in the new ring.
    pub to: NodeId,
}

/// Consistent hashing ring mapping keys to shard IDs.
///
/// Each node is mapped to `vnodes_per_node` virtual nodes on a `u64` ring.
/// A key is owned by the first vnode whose position is strictly greater than
/// the key's hash, wrapping around to the lowest position.
///
/// The ring is pure: no I/O, no interior mutability. Callers that mutate it
/// while others look keys up must provide their own exclusion.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Virtual node positions: ring position -> physical node.
    vnodes: BTreeMap<u64, NodeId>,
    /// Registered physical nodes.
    nodes: BTreeSet<NodeId>,
    /// Number of vnodes each node gets.
    vnodes_per_node: u16,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_VNODES)
    }
}

impl HashRing {
    /// Create a new empty ring.
    pub fn new(vnodes_per_node: u16) -> Self {
        info!(vnodes_per_node, "initialized hash ring");
        Self {
            vnodes: BTreeMap::new(),
            nodes: BTreeSet::new(),
            vnodes_per_node,
        }
    }

    /// Add a node to the ring.
    ///
    /// Inserts `vnodes_per_node` positions at `hash("{node_id}:{i}")`.
    /// Adding a node that is already present is a logged no-op.
    pub fn add_node(&mut self, node_id: impl Into<NodeId>) -> AddOutcome {
        let node_id = node_id.into();
        if self.nodes.contains(&node_id) {
            warn!(%node_id, "node already exists in ring");
            return AddOutcome::AlreadyPresent;
        }

        for i in 0..self.vnodes_per_node {
            let pos = vnode_position(&node_id, i);
            if let Some(previous) = self.vnodes.insert(pos, node_id.clone()) {
                // 64-bit collision: the newer node takes the position.
                warn!(%node_id, %previous, pos, "vnode position collision");
            }
        }

        info!(%node_id, vnodes = self.vnodes_per_node, "added node to ring");
        self.nodes.insert(node_id);
        AddOutcome::Added {
            vnodes: self.vnodes_per_node as usize,
        }
    }

    /// Remove a node and every vnode it owns.
    ///
    /// Removing a node that is not on the ring is a logged no-op.
    pub fn remove_node(&mut self, node_id: &str) -> RemoveOutcome {
        let Some(node_id) = self.nodes.take(node_id) else {
            warn!(node_id, "node not found in ring");
            return RemoveOutcome::NotFound;
        };

        let mut removed = 0;
        for i in 0..self.vnodes_per_node {
            let pos = vnode_position(&node_id, i);
            // Only drop positions this node still owns (it may have lost one to a collision).
            if self.vnodes.get(&pos) == Some(&node_id) {
                self.vnodes.remove(&pos);
                removed += 1;
            }
        }

        info!(%node_id, vnodes = removed, "removed node from ring");
        RemoveOutcome::Removed { vnodes: removed }
    }

    /// Find which node owns a key.
    ///
    /// Returns `None` iff the ring has no vnodes. A hash equal to a vnode
    /// position belongs to the *next* position clockwise.
    pub fn get_node(&self, key: &str) -> Option<&NodeId> {
        let pos = hash(key);
        self.vnodes
            .range((Bound::Excluded(pos), Bound::Unbounded))
            .next()
            .or_else(|| self.vnodes.iter().next())
            .map(|(_, node_id)| node_id)
    }

    /// Number of vnodes owned by each registered node.
    pub fn get_distribution(&self) -> BTreeMap<NodeId, usize> {
        let mut distribution: BTreeMap<NodeId, usize> =
            self.nodes.iter().map(|n| (n.clone(), 0)).collect();
        for node_id in self.vnodes.values() {
            *distribution.entry(node_id.clone()).or_default() += 1;
        }
        distribution
    }

    /// Compute which keys change owner between two ring states.
    ///
    /// Keys that have no owner in either ring are skipped.
    pub fn diff<'a>(
        old: &HashRing,
        new: &HashRing,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Relocation> {
        keys.into_iter()
            .filter_map(|key| match (old.get_node(key), new.get_node(key)) {
                (Some(from), Some(to)) if from != to => Some(Relocation {
                    key: key.to_string(),
                    from: from.clone(),
                    to: to.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Whether the node is registered.
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    /// Return the number of physical nodes in the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Return the total number of vnodes in the ring.
    pub fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }

    /// Registered node IDs in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter()
    }

    /// Configured vnodes per node.
    pub fn vnodes_per_node(&self) -> u16 {
        self.vnodes_per_node
    }
}

/// Hash a string to a ring position.
///
/// SHA-256 of the UTF-8 bytes; the first 8 bytes of the digest read as a
/// big-endian `u64` (the first 16 hex digits). Stable across processes.
pub fn hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Position of a node's `vnode_index`-th vnode: `hash("{node_id}:{vnode_index}")`.
fn vnode_position(node_id: &NodeId, vnode_index: u16) -> u64 {
    hash(&format!("{node_id}:{vnode_index}"))
}
