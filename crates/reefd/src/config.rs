//! TOML configuration for the Reef daemon.

use std::path::{Path, PathBuf};

use reef_engine::ShardManagerConfig;
use reef_types::StorageBackend;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Node identity and addresses.
    pub node: NodeSection,
    /// Shard layout and storage backend.
    pub shards: ShardsSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Identifier reported by `/health`.
    pub id: String,
    /// Directory holding one WAL file per shard.
    pub data_dir: PathBuf,
    /// Address for the HTTP API.
    pub listen_addr: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: "unknown".to_string(),
            data_dir: PathBuf::from("data"),
            listen_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

/// `[shards]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShardsSection {
    /// Number of shards, named `shard-0` .. `shard-{count-1}`.
    pub count: usize,
    /// Virtual nodes per shard on the hash ring.
    pub vnodes: u16,
    /// Backend type: `"wal"` (default) or `"memory"`.
    pub backend: StorageBackend,
}

impl Default for ShardsSection {
    fn default() -> Self {
        Self {
            count: 3,
            vnodes: reef_engine::DEFAULT_VNODES,
            backend: StorageBackend::Wal,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Shard manager configuration derived from the `[node]` and `[shards]`
    /// sections.
    pub fn manager_config(&self) -> ShardManagerConfig {
        let mut config = ShardManagerConfig::with_shard_count(self.shards.count, &self.node.data_dir);
        config.vnodes_per_node = self.shards.vnodes;
        config.backend = self.shards.backend;
        config
    }
}
