/// Transaction types for the coin ledger
use crate::amount::Amount;
use crate::crypto::{Sha256Hash, Token};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// What a transaction asks the ledger to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Payload {
    /// Sentinel occupying index 0 of the first block.
    Genesis,
    TokenTransfer(TokenTransfer),
    NftTransfer(NftTransfer),
    #[serde(rename = "nft-create")]
    NftMint(NftMint),
    Credit(Credit),
}

/// Moves fungible balance. `from` is the sender's private token, `to` the
/// recipient's public token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub from: Token,
    pub to: Token,
    pub amount: Amount,
}

/// Moves an NFT. `from` is the holder's private token, `to` the recipient's
/// public token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftTransfer {
    pub nft: Token,
    pub from: Token,
    pub to: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMint {
    pub name: String,
    pub description: String,
    pub url: String,
    /// Public token of the first owner.
    pub owner: Token,
}

/// Privileged issuance of fungible balance to a public token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub to: Token,
    pub amount: Amount,
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Genesis => "genesis",
            Payload::TokenTransfer(_) => "token-transfer",
            Payload::NftTransfer(_) => "nft-transfer",
            Payload::NftMint(_) => "nft-create",
            Payload::Credit(_) => "credit",
        }
    }

    /// Feeds a canonical byte encoding of the payload into `hasher`.
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.kind().as_bytes());
        match self {
            Payload::Genesis => {}
            Payload::TokenTransfer(tx) => {
                hash_field(hasher, tx.from.as_bytes());
                hash_field(hasher, tx.to.as_bytes());
                hasher.update(tx.amount.to_le_bytes());
            }
            Payload::NftTransfer(tx) => {
                hash_field(hasher, tx.nft.as_bytes());
                hash_field(hasher, tx.from.as_bytes());
                hash_field(hasher, tx.to.as_bytes());
            }
            Payload::NftMint(tx) => {
                hash_field(hasher, tx.name.as_bytes());
                hash_field(hasher, tx.description.as_bytes());
                hash_field(hasher, tx.url.as_bytes());
                hash_field(hasher, tx.owner.as_bytes());
            }
            Payload::Credit(tx) => {
                hash_field(hasher, tx.to.as_bytes());
                hasher.update(tx.amount.to_le_bytes());
            }
        }
    }
}

/// Length-prefixes variable fields so adjacent strings cannot be shifted
/// into each other without changing the digest.
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// An immutable intent record plus its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub input: Payload,
    #[serde(with = "crate::crypto::hex_hash")]
    pub hash: Sha256Hash,
}

impl Transaction {
    pub fn new(timestamp: i64, input: Payload) -> Self {
        let hash = Self::compute_hash(timestamp, &input);
        Transaction {
            timestamp,
            input,
            hash,
        }
    }

    /// A transaction stamped with the current time.
    pub fn now(input: Payload) -> Self {
        Self::new(chrono::Utc::now().timestamp_millis(), input)
    }

    pub fn genesis(timestamp: i64) -> Self {
        Self::new(timestamp, Payload::Genesis)
    }

    pub fn token_transfer(from: Token, to: Token, amount: Amount) -> Self {
        Self::now(Payload::TokenTransfer(TokenTransfer { from, to, amount }))
    }

    pub fn nft_transfer(nft: Token, from: Token, to: Token) -> Self {
        Self::now(Payload::NftTransfer(NftTransfer { nft, from, to }))
    }

    pub fn nft_mint(name: String, description: String, url: String, owner: Token) -> Self {
        Self::now(Payload::NftMint(NftMint {
            name,
            description,
            url,
            owner,
        }))
    }

    pub fn credit(to: Token, amount: Amount) -> Self {
        Self::now(Payload::Credit(Credit { to, amount }))
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.input, Payload::Genesis)
    }

    fn compute_hash(timestamp: i64, input: &Payload) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        input.digest_into(&mut hasher);
        hasher.finalize().into()
    }

    /// Re-derives the content hash from the current fields.
    pub fn content_hash(&self) -> Sha256Hash {
        Self::compute_hash(self.timestamp, &self.input)
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }
}
