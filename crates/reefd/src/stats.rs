//! Offline statistics for `reefd stats`.
//!
//! Reads each shard's log directly instead of opening the stores, so nothing
//! in the data directory is created, repaired or synced.

use std::path::Path;

use anyhow::{Context, Result};
use reef_engine::ShardManagerConfig;
use reef_placement::{AddOutcome, HashRing};
use reef_types::NodeId;

/// Replay results for one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReport {
    pub id: NodeId,
    /// Live keys after replay.
    pub keys: usize,
    /// Log lines that could not be applied.
    pub skipped: usize,
    /// Ring positions owned by the shard.
    pub vnodes: usize,
    /// No log file exists for this shard yet.
    pub missing: bool,
}

/// Per-shard replay results for a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineStats {
    pub total_keys: usize,
    pub shards: Vec<ShardReport>,
}

/// Replay every configured shard's log read-only.
pub async fn collect(config: &ShardManagerConfig) -> Result<OfflineStats> {
    let mut ring = HashRing::new(config.vnodes_per_node);
    let mut ids = Vec::new();
    for id in &config.shard_ids {
        if let AddOutcome::Added { .. } = ring.add_node(id.clone()) {
            ids.push(id.clone());
        }
    }
    let distribution = ring.get_distribution();

    let mut shards = Vec::with_capacity(ids.len());
    for id in ids {
        let path = config.data_dir.join(format!("{id}.wal"));
        let (keys, skipped, missing) = replay_shard(&path).await?;
        shards.push(ShardReport {
            vnodes: distribution.get(&id).copied().unwrap_or_default(),
            id,
            keys,
            skipped,
            missing,
        });
    }

    Ok(OfflineStats {
        total_keys: shards.iter().map(|s| s.keys).sum(),
        shards,
    })
}

async fn replay_shard(path: &Path) -> Result<(usize, usize, bool)> {
    let exists = tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if !exists {
        return Ok((0, 0, true));
    }
    let (state, report) = reef_wal::replay_file(path)
        .await
        .with_context(|| format!("failed to replay {}", path.display()))?;
    Ok((state.len(), report.skipped, false))
}
