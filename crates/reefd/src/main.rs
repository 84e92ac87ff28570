//! `reefd`: the Reef daemon.
//!
//! Binary entrypoint that opens the shard manager and serves the JSON HTTP
//! API on top of it.
//!
//! # Usage
//!
//! ```text
//! reefd start                               # start with defaults
//! reefd start -c reef.toml                  # start with a config file
//! reefd start -d ./node2 -l 127.0.0.1:8001  # second instance
//! reefd start --memory                      # no disk persistence
//! reefd stats -d ./data                     # offline per-shard key counts
//! ```

mod config;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reef_engine::ShardManager;
use reef_http::{HttpServer, HttpServerConfig};
use reef_types::StorageBackend;
use tracing::{error, info};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "reefd", version, about = "Reef sharded key-value store daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node and serve the HTTP API.
    Start {
        /// Override data directory (useful for running multiple instances).
        #[arg(short, long, env = "DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Override the number of shards.
        #[arg(short = 'n', long, env = "NUM_SHARDS")]
        shards: Option<usize>,

        /// Override virtual nodes per shard.
        #[arg(long, env = "NUM_VNODES")]
        vnodes: Option<u16>,

        /// Override HTTP listen address (e.g. "127.0.0.1:8001").
        #[arg(short = 'l', long = "listen", env = "LISTEN_ADDR")]
        listen_addr: Option<String>,

        /// Identifier reported by `/health`.
        #[arg(long, env = "NODE_ID")]
        node_id: Option<String>,

        /// Run fully in-memory (no disk persistence).
        #[arg(short, long)]
        memory: bool,
    },

    /// Replay the shard logs offline and print per-shard key counts.
    Stats {
        /// Override data directory.
        #[arg(short, long, env = "DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Override the number of shards.
        #[arg(short = 'n', long, env = "NUM_SHARDS")]
        shards: Option<usize>,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Start {
            data_dir,
            shards,
            vnodes,
            listen_addr,
            node_id,
            memory,
        } => {
            // CLI args override config file values.
            if let Some(dir) = data_dir {
                config.node.data_dir = dir;
            }
            if let Some(n) = shards {
                config.shards.count = n;
            }
            if let Some(v) = vnodes {
                config.shards.vnodes = v;
            }
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            if let Some(id) = node_id {
                config.node.id = id;
            }
            if memory {
                config.shards.backend = StorageBackend::Memory;
            }
            cmd_start(config).await
        }
        Commands::Stats { data_dir, shards } => {
            if let Some(dir) = data_dir {
                config.node.data_dir = dir;
            }
            if let Some(n) = shards {
                config.shards.count = n;
            }
            cmd_stats(&config).await
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// reefd start
// -----------------------------------------------------------------------

async fn cmd_start(config: CliConfig) -> Result<()> {
    info!("starting reefd");
    info!(
        node_id = %config.node.id,
        data_dir = %config.node.data_dir.display(),
        addr = %config.node.listen_addr,
        shards = config.shards.count,
        vnodes = config.shards.vnodes,
        backend = ?config.shards.backend,
        "node configuration"
    );

    let manager = Arc::new(ShardManager::new(config.manager_config()));
    manager
        .initialize()
        .await
        .context("failed to initialize shard manager")?;

    let total_keys = manager.size().await?;
    info!(shards = config.shards.count, total_keys, "shard manager ready");

    let server = HttpServer::new(HttpServerConfig {
        manager: manager.clone(),
        node_id: config.node.id.clone(),
    });

    let served = server
        .serve_with_shutdown(&config.node.listen_addr, shutdown_signal())
        .await
        .context("HTTP server failed");

    // Close the shards even when the server failed, so every log is synced.
    info!("closing shard manager");
    if let Err(e) = manager.close().await {
        error!(error = %e, "shard manager close failed");
        served?;
        return Err(e).context("failed to close shard manager");
    }
    served?;

    info!("reefd stopped");
    Ok(())
}

/// Resolve when the process receives Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}

// -----------------------------------------------------------------------
// reefd stats
// -----------------------------------------------------------------------

async fn cmd_stats(config: &CliConfig) -> Result<()> {
    let data_dir = &config.node.data_dir;
    if !data_dir.is_dir() {
        anyhow::bail!(
            "no data directory at {}. Has the node been started?",
            data_dir.display()
        );
    }

    let stats = stats::collect(&config.manager_config()).await?;

    println!("Data directory: {}", data_dir.display());
    println!("Shards:         {}", stats.shards.len());
    println!("Total keys:     {}", stats.total_keys);
    for shard in &stats.shards {
        let mut line = format!("  {}: keys={} vnodes={}", shard.id, shard.keys, shard.vnodes);
        if shard.missing {
            line.push_str(" (no log)");
        } else if shard.skipped > 0 {
            line.push_str(&format!(" skipped={}", shard.skipped));
        }
        println!("{line}");
    }

    Ok(())
}
