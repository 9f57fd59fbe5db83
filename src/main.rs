#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Emberchain node entrypoint (systemd-friendly).
//! Loads the TOML config, starts the node, and keeps the process alive.

use anyhow::Result;
use emberchain::core::ledger::live_genesis;
use emberchain::node::{Node, NodeConfig};
use tracing::info;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config_path = env("EMBER_CONFIG", "config.toml");
    let cfg = match std::fs::read_to_string(&config_path) {
        Ok(raw) => NodeConfig::from_toml(&raw)?,
        Err(_) => {
            info!(path = %config_path, "no config file; using defaults");
            NodeConfig::default()
        }
    };

    let node = Node::new(cfg, live_genesis()).await?;
    node.start();
    info!(endpoint = %node.endpoint(), "node running");

    tokio::signal::ctrl_c().await?;
    node.stop();
    info!("node stopped");
    Ok(())
}
