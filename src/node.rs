//! Process wiring: load configuration, open or restore the ledger, serve it.

use crate::blockchain::Blockchain;
use crate::config::{load_config, Config, LedgerSection};
use crate::error::ChainError;
use crate::persistence::{JsonFilePersistence, Persistence};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct Node {
    pub config: Config,
    pub ledger: Arc<RwLock<Blockchain>>,
}

impl Node {
    pub fn init(config_path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let config = load_config(config_path)?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self, ChainError> {
        info!(
            name = %config.ledger.name,
            difficulty = config.ledger.difficulty,
            snapshot = %config.ledger.snapshot_path.display(),
            "starting coin ledger node"
        );
        let ledger = open_ledger(&config.ledger)?;
        Ok(Self {
            config,
            ledger: Arc::new(RwLock::new(ledger)),
        })
    }

    /// Serves the API until ctrl-c, then writes a final snapshot.
    #[cfg(feature = "api")]
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error>> {
        use crate::api::{run_api_server, AppState};
        use std::net::{IpAddr, SocketAddr};
        use tracing::{error, warn};

        let ip: IpAddr = self
            .config
            .web
            .host
            .parse()
            .map_err(|e| format!("Invalid web.host {}: {}", self.config.web.host, e))?;
        let addr = SocketAddr::new(ip, self.config.web.port);
        let state = AppState::new(self.ledger.clone(), self.config.web.key.as_str());

        run_api_server(state, addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            warn!("Stopping...");
        })
        .await?;

        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || ledger.blocking_read().sync()).await??;
        info!("Final snapshot written");
        Ok(())
    }
}

/// Restores the ledger from its snapshot file, or creates a fresh one and
/// writes its first snapshot. A snapshot that fails validation is fatal.
pub fn open_ledger(section: &LedgerSection) -> Result<Blockchain, ChainError> {
    let store = JsonFilePersistence::new(&section.snapshot_path);
    let config = section.ledger_config();

    match store.load_snapshot()? {
        Some(snapshot) => {
            info!("Restoring blockchain");
            let chain = Blockchain::from_snapshot(snapshot, config, Box::new(store))?;
            info!("Chain is valid");
            Ok(chain)
        }
        None => {
            info!("Creating new blockchain");
            let chain = Blockchain::new_with_persistence(config, Box::new(store))?;
            chain.sync()?;
            Ok(chain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;
    use crate::config::parse_config;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let text = format!(
            "[web]\nhost = \"127.0.0.1\"\nport = 0\n\n[ledger]\ndifficulty = 1\nsnapshot_path = \"{}\"\n",
            dir.path().join("chain.json").display()
        );
        parse_config(&text).unwrap()
    }

    #[test]
    fn test_fresh_start_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let node = Node::with_config(config_in(&dir)).unwrap();
        assert_eq!(node.ledger.blocking_read().len(), 1);
        assert!(dir.path().join("chain.json").exists());
    }

    #[test]
    fn test_restart_restores_state() {
        let dir = TempDir::new().unwrap();
        let public = {
            let node = Node::with_config(config_in(&dir)).unwrap();
            let mut ledger = node.ledger.blocking_write();
            let a = ledger.create_wallet().unwrap();
            ledger.credit(a.public().clone(), units(12)).unwrap();
            a.public().clone()
        };

        let node = Node::with_config(config_in(&dir)).unwrap();
        let ledger = node.ledger.blocking_read();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.wallets().balance_of(&public), Some(units(12)));
    }

    #[test]
    fn test_corrupted_snapshot_is_fatal() {
        let dir = TempDir::new().unwrap();
        {
            let node = Node::with_config(config_in(&dir)).unwrap();
            let mut ledger = node.ledger.blocking_write();
            let a = ledger.create_wallet().unwrap();
            ledger.credit(a.public().clone(), units(1)).unwrap();
        }
        let path = dir.path().join("chain.json");
        let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        doc["coin"][1]["previous_hash"] = serde_json::Value::String("00".repeat(32));
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(matches!(
            Node::with_config(config_in(&dir)),
            Err(ChainError::InvalidChain(_))
        ));
    }
}
