#![forbid(unsafe_code)]
//! Coin ledger node: restores or creates the chain and serves the HTTP API

use clap::Parser;
use coinledger::config::DEFAULT_CONFIG_FILE;
use coinledger::node::Node;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config; `.toml` is appended when missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let started = chrono::Utc::now();
    info!("Started at: {}", started.to_rfc3339());

    let node = match Node::init(&cli.config) {
        Ok(node) => node,
        Err(e) => {
            error!("Failed to start node: {}", e);
            return Err(e.into());
        }
    };

    node.start().await?;
    info!("Stopped!");
    Ok(())
}
