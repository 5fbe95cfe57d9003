//! Snapshot document: the serialized form of a whole ledger.
//!
//! ```json
//! { "coin": [ { "timestamp", "transactions", "addresses", "previous_hash",
//!               "hash", "status", "nft", "proof" }, ... ],
//!   "wallet": [ { "address": { "pve", "pbc" }, "info": { "balance", "nfts" } } ],
//!   "pending": [ ... ] }
//! ```
//!
//! Restoring is trusted: proofs are not re-mined and transactions are not
//! re-applied. Only the hash-linkage check runs, and a failure there is fatal.

use crate::blockchain::{Block, BlockStatus, Blockchain};
use crate::config::LedgerConfig;
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::nft::NftAsset;
use crate::persistence::Persistence;
use crate::transaction::Transaction;
use crate::wallet::{WalletRecord, WalletRegistry};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDocument {
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    /// Wallet records as of the snapshot. Informational; restore reads the
    /// top-level `wallet` list instead.
    #[serde(default)]
    pub addresses: Vec<WalletRecord>,
    #[serde(with = "crate::crypto::hex_hash")]
    pub previous_hash: Sha256Hash,
    #[serde(with = "crate::crypto::hex_hash")]
    pub hash: Sha256Hash,
    #[serde(default)]
    pub status: BlockStatus,
    #[serde(default, with = "crate::nft::with_hash")]
    pub nft: Vec<NftAsset>,
    #[serde(default)]
    pub proof: u64,
}

impl BlockDocument {
    fn from_block(block: &Block, addresses: &[WalletRecord]) -> Self {
        BlockDocument {
            timestamp: block.timestamp,
            transactions: block.transactions.clone(),
            addresses: addresses.to_vec(),
            previous_hash: block.previous_hash,
            hash: block.hash,
            status: block.status,
            nft: block.nft.clone(),
            proof: block.proof,
        }
    }

    pub fn into_block(self) -> Block {
        Block {
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            hash: self.hash,
            proof: self.proof,
            status: self.status,
            nft: self.nft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub coin: Vec<BlockDocument>,
    #[serde(alias = "Wallet")]
    pub wallet: Vec<WalletRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<Transaction>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<Vec<u8>, ChainError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The chain as blocks, without the per-block wallet copies.
    pub fn blocks(&self) -> Vec<Block> {
        self.coin.iter().cloned().map(BlockDocument::into_block).collect()
    }
}

impl Blockchain {
    pub fn to_snapshot(&self) -> Snapshot {
        let records = self.wallets.records();
        Snapshot {
            coin: self
                .blocks
                .iter()
                .map(|b| BlockDocument::from_block(b, records))
                .collect(),
            wallet: records.to_vec(),
            pending: self.pending.clone(),
        }
    }

    /// Rebuilds a ledger from a snapshot and checks its hash linkage.
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: LedgerConfig,
        persistence: Box<dyn Persistence>,
    ) -> Result<Self, ChainError> {
        config.validate()?;

        let blockchain = Blockchain {
            name: config.name,
            blocks: snapshot.coin.into_iter().map(BlockDocument::into_block).collect(),
            difficulty: config.difficulty,
            min_transactions: config.min_transactions,
            apply_mode: config.apply_mode,
            pending: snapshot.pending,
            wallets: WalletRegistry::from_records(snapshot.wallet),
            persistence,
        };

        blockchain.validate_chain()?;
        info!(
            blocks = blockchain.blocks.len(),
            wallets = blockchain.wallets.len(),
            pending = blockchain.pending.len(),
            "restored chain from snapshot"
        );
        Ok(blockchain)
    }
}
