//! Configuration management for the coin ledger

use crate::blockchain::ApplyMode;
use crate::error::ChainError;
use crate::miner::check_difficulty;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Values the ledger core consumes. Everything else in [`Config`] belongs to
/// the adapters around it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub name: String,
    pub difficulty: u32,
    pub min_transactions: usize,
    pub apply_mode: ApplyMode,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            difficulty: default_difficulty(),
            min_transactions: default_min_transactions(),
            apply_mode: ApplyMode::default(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ChainError> {
        check_difficulty(self.difficulty)?;
        if self.min_transactions == 0 {
            return Err(ChainError::InvalidConfig(
                "min_transactions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub ledger: LedgerSection,
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret gating privileged operations (credit, sync).
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct LedgerSection {
    pub name: String,
    pub difficulty: u32,
    pub min_transactions: usize,
    pub apply_mode: ApplyMode,
    pub snapshot_path: PathBuf,
}

impl LedgerSection {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            name: self.name.clone(),
            difficulty: self.difficulty,
            min_transactions: self.min_transactions,
            apply_mode: self.apply_mode,
        }
    }
}

// Raw file shape. Every field is optional here so that a missing required
// field can be reported by name instead of as a generic parse error.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    web: Option<RawWeb>,
    #[serde(default)]
    ledger: RawLedger,
}

#[derive(Debug, Default, Deserialize)]
struct RawWeb {
    host: Option<String>,
    port: Option<u16>,
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLedger {
    name: Option<String>,
    difficulty: Option<u32>,
    #[serde(alias = "minTransactions")]
    min_transactions: Option<usize>,
    apply_mode: Option<ApplyMode>,
    snapshot_path: Option<String>,
}

fn default_name() -> String {
    "Coin".to_string()
}

fn default_difficulty() -> u32 {
    4
}

fn default_min_transactions() -> usize {
    1
}

fn default_key() -> String {
    "secret".to_string()
}

fn default_snapshot_path() -> String {
    "blockchain.json".to_string()
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ChainError> {
    value.ok_or_else(|| ChainError::MissingConfigField(field.to_string()))
}

/// Parses configuration text. `[web]` with `host` and `port` is required;
/// everything else has a default.
pub fn parse_config(text: &str) -> Result<Config, ChainError> {
    let raw: RawConfig = toml::from_str(text)?;

    let web = required(raw.web, "web")?;
    let web = WebConfig {
        host: required(web.host, "web.host")?,
        port: required(web.port, "web.port")?,
        key: web.key.unwrap_or_else(default_key),
    };

    let ledger = LedgerSection {
        name: raw.ledger.name.unwrap_or_else(default_name),
        difficulty: raw.ledger.difficulty.unwrap_or_else(default_difficulty),
        min_transactions: raw
            .ledger
            .min_transactions
            .unwrap_or_else(default_min_transactions),
        apply_mode: raw.ledger.apply_mode.unwrap_or_default(),
        snapshot_path: PathBuf::from(
            raw.ledger
                .snapshot_path
                .unwrap_or_else(default_snapshot_path),
        ),
    };

    if web.key.is_empty() {
        return Err(ChainError::InvalidConfig("web.key must not be empty".to_string()));
    }
    ledger.ledger_config().validate()?;

    Ok(Config { web, ledger })
}

/// Resolves the config file path, trying `<path>.toml` when `path` itself
/// does not exist.
fn resolve_path(path: &Path) -> Result<PathBuf, ChainError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.extension().map_or(true, |ext| ext != "toml") {
        let with_ext = path.with_extension("toml");
        if with_ext.is_file() {
            return Ok(with_ext);
        }
    }
    Err(ChainError::ConfigError(format!(
        "Config file not found: {}",
        path.display()
    )))
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = resolve_path(path.as_ref())?;
    let text = fs::read_to_string(&path)?;
    parse_config(&text)
}
