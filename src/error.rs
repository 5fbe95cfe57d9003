//! Error types for the coin ledger

use crate::amount::Amount;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    /// Hash or linkage mismatch found while walking the chain. Fatal for the
    /// ledger instance that produced it.
    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("Self transfer rejected for wallet {0}")]
    SelfTransfer(String),

    #[error("Negative amount rejected: {0}")]
    NegativeAmount(Amount),

    #[error("Wallet not found: {0}")]
    UnresolvedWallet(String),

    #[error("NFT not found: {0}")]
    UnresolvedAsset(String),

    #[error("Key collision persisted after {0} attempts")]
    KeyCollision(usize),

    #[error("Insufficient transactions to seal a block: {pending} pending, {required} required")]
    InsufficientTransactions { pending: usize, required: usize },

    #[error("Block rejected: {0}")]
    BlockRejected(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Missing field {0} in configuration")]
    MissingConfigField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ChainError {
    /// True for errors caused by a reference that does not resolve against
    /// the wallet registry.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            ChainError::UnresolvedWallet(_) | ChainError::UnresolvedAsset(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<tempfile::PersistError> for ChainError {
    fn from(err: tempfile::PersistError) -> Self {
        ChainError::IoError(err.error.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
