//! Wallet registry: balances and NFT holdings keyed by bearer tokens.
//!
//! Records are kept in creation order and looked up by linear scan, by public
//! token for credits and by private token for authorization.

use crate::amount::{Amount, ZERO};
use crate::crypto::{KeyPair, Token};
use crate::error::ChainError;
use crate::nft::NftAsset;
use serde::{Deserialize, Serialize};

/// How many fresh key pairs `create_wallet` draws before giving up.
pub const MAX_KEY_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub balance: Amount,
    #[serde(default, with = "crate::nft::with_hash")]
    pub nfts: Vec<NftAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: KeyPair,
    pub info: WalletInfo,
}

impl WalletRecord {
    fn new(address: KeyPair) -> Self {
        WalletRecord {
            address,
            info: WalletInfo::default(),
        }
    }

    pub fn public(&self) -> &Token {
        &self.address.public
    }

    pub fn private(&self) -> &Token {
        &self.address.private
    }

    pub fn balance(&self) -> Amount {
        self.info.balance
    }

    pub fn nfts(&self) -> &[NftAsset] {
        &self.info.nfts
    }

    pub fn holds(&self, nft_id: &Token) -> bool {
        self.info.nfts.iter().any(|n| &n.id == nft_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletRegistry {
    records: Vec<WalletRecord>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<WalletRecord>) -> Self {
        WalletRegistry { records }
    }

    pub fn records(&self) -> &[WalletRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &WalletRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Creates a zero-balance wallet with a fresh random key pair.
    pub fn create_wallet(&mut self) -> Result<WalletRecord, ChainError> {
        self.create_wallet_with(KeyPair::generate)
    }

    /// Creates a wallet using `generate` for key pairs, drawing again while
    /// the candidate collides with any existing token.
    pub fn create_wallet_with<F>(&mut self, mut generate: F) -> Result<WalletRecord, ChainError>
    where
        F: FnMut() -> KeyPair,
    {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let candidate = generate();
            let collides = candidate.private == candidate.public
                || self.records.iter().any(|r| r.address.collides_with(&candidate));
            if collides {
                tracing::debug!(attempt, "key pair collided with an existing wallet, regenerating");
                continue;
            }
            let record = WalletRecord::new(candidate);
            self.records.push(record.clone());
            return Ok(record);
        }
        Err(ChainError::KeyCollision(MAX_KEY_ATTEMPTS))
    }

    fn find(&self, private: &Token, public: &Token) -> Option<&WalletRecord> {
        self.records
            .iter()
            .find(|r| r.address.private == *private && r.address.public == *public)
    }

    fn find_by_public(&self, public: &Token) -> Option<&WalletRecord> {
        self.records.iter().find(|r| r.address.public == *public)
    }

    fn find_by_public_mut(&mut self, public: &Token) -> Option<&mut WalletRecord> {
        self.records.iter_mut().find(|r| r.address.public == *public)
    }

    fn find_by_private_mut(&mut self, private: &Token) -> Option<&mut WalletRecord> {
        self.records.iter_mut().find(|r| r.address.private == *private)
    }

    pub fn record_by_public(&self, public: &Token) -> Option<&WalletRecord> {
        self.find_by_public(public)
    }

    /// Balance of the wallet identified by both tokens; `None` when the pair
    /// does not resolve, which is distinct from a zero balance.
    pub fn get_balance(&self, private: &Token, public: &Token) -> Option<Amount> {
        self.find(private, public).map(WalletRecord::balance)
    }

    /// Public-token-only balance lookup, for internal bookkeeping.
    pub fn balance_of(&self, public: &Token) -> Option<Amount> {
        self.find_by_public(public).map(WalletRecord::balance)
    }

    /// Adds `amount` (which may be negative) to a wallet and returns the new
    /// balance.
    pub fn credit_wallet(&mut self, public: &Token, amount: Amount) -> Result<Amount, ChainError> {
        let record = self
            .find_by_public_mut(public)
            .ok_or_else(|| ChainError::UnresolvedWallet(public.to_string()))?;
        let balance = record
            .info
            .balance
            .checked_add(amount)
            .ok_or_else(|| ChainError::InvalidTransaction(format!("Balance overflow for wallet {}", public)))?;
        record.info.balance = balance;
        Ok(record.info.balance)
    }

    pub fn get_public_key(&self, private: &Token) -> Option<Token> {
        self.records
            .iter()
            .find(|r| r.address.private == *private)
            .map(|r| r.address.public.clone())
    }

    pub fn validate_address(&self, private: &Token, public: &Token) -> bool {
        self.find(private, public).is_some()
    }

    /// Places `nft` in the holdings of the wallet with public token `public`
    /// and records that wallet as its owner.
    pub fn give_nft(&mut self, public: &Token, mut nft: NftAsset) -> Result<(), ChainError> {
        let record = self
            .find_by_public_mut(public)
            .ok_or_else(|| ChainError::UnresolvedWallet(public.to_string()))?;
        if record.holds(&nft.id) {
            return Err(ChainError::InvalidTransaction(format!(
                "NFT {} is already held by {}",
                nft.id, public
            )));
        }
        nft.owner = public.clone();
        record.info.nfts.push(nft);
        Ok(())
    }

    /// Removes the asset `nft_id` from the holdings of the wallet with
    /// private token `private`.
    pub fn take_nft(&mut self, private: &Token, nft_id: &Token) -> Result<NftAsset, ChainError> {
        let record = self
            .find_by_private_mut(private)
            .ok_or_else(|| ChainError::UnresolvedWallet(private.to_string()))?;
        let idx = record
            .info
            .nfts
            .iter()
            .position(|n| &n.id == nft_id)
            .ok_or_else(|| ChainError::UnresolvedAsset(nft_id.to_string()))?;
        Ok(record.info.nfts.remove(idx))
    }

    /// Finds an asset across every wallet's holdings.
    pub fn get_nft(&self, nft_id: &Token) -> Option<&NftAsset> {
        self.records
            .iter()
            .flat_map(|r| r.info.nfts.iter())
            .find(|n| &n.id == nft_id)
    }

    pub fn nfts_of(&self, public: &Token) -> Option<&[NftAsset]> {
        self.find_by_public(public).map(WalletRecord::nfts)
    }

    /// Exact sum of all balances. Invariant under transfers.
    pub fn total_balance(&self) -> Amount {
        self.records
            .iter()
            .fold(ZERO, |acc, r| acc.saturating_add(r.info.balance))
    }
}
