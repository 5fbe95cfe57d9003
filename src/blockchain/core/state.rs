use crate::amount::ZERO;
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::nft::NftAsset;
use crate::transaction::{Credit, NftMint, NftTransfer, Payload, TokenTransfer, Transaction};
use crate::wallet::WalletRegistry;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What happens to a block when one of its transactions references a wallet
/// or asset that does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Skip the transaction and keep applying the rest of the block.
    #[default]
    Lenient,
    /// Reject the whole block, leaving the registry untouched.
    Strict,
}

/// Result of a single successful application step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Done,
    /// The genesis sentinel: nothing after it in the block is applied.
    EndOfBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Position of the transaction in its block.
    pub index: usize,
    pub tx_hash: Sha256Hash,
    pub reason: ChainError,
}

/// Per-block account of which transactions took effect, keyed by position
/// in the block. Identical payloads submitted in the same millisecond share
/// a hash, so positions are the only unambiguous key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: Vec<usize>,
    pub rejected: Vec<Rejection>,
}

impl ApplyReport {
    pub fn was_applied(&self, index: usize) -> bool {
        self.applied.contains(&index)
    }

    pub fn rejection_at(&self, index: usize) -> Option<&ChainError> {
        self.rejected
            .iter()
            .find(|r| r.index == index)
            .map(|r| &r.reason)
    }
}

/// Applies one transaction to `wallets`. Every reference is resolved before
/// anything is mutated, so an `Err` leaves the registry as it was.
pub fn apply_transaction(
    wallets: &mut WalletRegistry,
    tx: &Transaction,
    minted: &mut Vec<NftAsset>,
) -> Result<Applied, ChainError> {
    match &tx.input {
        Payload::Genesis => return Ok(Applied::EndOfBlock),
        Payload::TokenTransfer(t) => apply_token_transfer(wallets, t)?,
        Payload::NftTransfer(t) => apply_nft_transfer(wallets, t)?,
        Payload::NftMint(t) => {
            let nft = apply_nft_mint(wallets, t, tx.timestamp)?;
            minted.push(nft);
        }
        Payload::Credit(t) => apply_credit(wallets, t)?,
    }
    Ok(Applied::Done)
}

fn apply_token_transfer(wallets: &mut WalletRegistry, tx: &TokenTransfer) -> Result<(), ChainError> {
    let from_public = wallets
        .get_public_key(&tx.from)
        .ok_or_else(|| ChainError::UnresolvedWallet(tx.from.to_string()))?;

    if tx.amount < ZERO {
        return Err(ChainError::NegativeAmount(tx.amount));
    }
    if tx.to == from_public {
        return Err(ChainError::SelfTransfer(from_public.to_string()));
    }
    if wallets.record_by_public(&tx.to).is_none() {
        return Err(ChainError::UnresolvedWallet(tx.to.to_string()));
    }

    let balance = wallets
        .balance_of(&from_public)
        .ok_or_else(|| ChainError::UnresolvedWallet(from_public.to_string()))?;
    if balance < tx.amount {
        return Err(ChainError::InsufficientFunds {
            balance,
            requested: tx.amount,
        });
    }

    wallets.credit_wallet(&tx.to, tx.amount)?;
    wallets.credit_wallet(&from_public, -tx.amount)?;
    Ok(())
}

fn apply_nft_transfer(wallets: &mut WalletRegistry, tx: &NftTransfer) -> Result<(), ChainError> {
    let from_public = wallets
        .get_public_key(&tx.from)
        .ok_or_else(|| ChainError::UnresolvedWallet(tx.from.to_string()))?;
    if wallets.record_by_public(&tx.to).is_none() {
        return Err(ChainError::UnresolvedWallet(tx.to.to_string()));
    }
    let held = wallets
        .record_by_public(&from_public)
        .map(|r| r.holds(&tx.nft))
        .unwrap_or(false);
    if !held {
        return Err(ChainError::UnresolvedAsset(tx.nft.to_string()));
    }

    let nft = wallets.take_nft(&tx.from, &tx.nft)?;
    wallets.give_nft(&tx.to, nft)
}

fn apply_nft_mint(wallets: &mut WalletRegistry, tx: &NftMint, timestamp: i64) -> Result<NftAsset, ChainError> {
    if wallets.record_by_public(&tx.owner).is_none() {
        return Err(ChainError::UnresolvedWallet(tx.owner.to_string()));
    }
    let nft = NftAsset::mint(
        tx.name.clone(),
        tx.description.clone(),
        tx.url.clone(),
        tx.owner.clone(),
        timestamp,
    );
    wallets.give_nft(&tx.owner, nft.clone())?;
    Ok(nft)
}

fn apply_credit(wallets: &mut WalletRegistry, tx: &Credit) -> Result<(), ChainError> {
    if tx.amount < ZERO {
        return Err(ChainError::NegativeAmount(tx.amount));
    }
    wallets.credit_wallet(&tx.to, tx.amount)?;
    Ok(())
}

/// Applies a block's transactions in order.
///
/// Semantic rejections are recorded in the report and skipped. Unresolved
/// references are skipped too in [`ApplyMode::Lenient`]; in
/// [`ApplyMode::Strict`] the first one aborts with `BlockRejected`, and the
/// caller is expected to have staged `wallets` so it can be discarded.
pub fn apply_transactions(
    wallets: &mut WalletRegistry,
    transactions: &[Transaction],
    mode: ApplyMode,
) -> Result<(Vec<NftAsset>, ApplyReport), ChainError> {
    let mut minted = Vec::new();
    let mut report = ApplyReport::default();

    for (index, tx) in transactions.iter().enumerate() {
        match apply_transaction(wallets, tx, &mut minted) {
            Ok(Applied::EndOfBlock) => break,
            Ok(Applied::Done) => report.applied.push(index),
            Err(e) if mode == ApplyMode::Strict && e.is_unresolved() => {
                return Err(ChainError::BlockRejected(format!(
                    "transaction {}: {}",
                    tx.hash_str(),
                    e
                )));
            }
            Err(e) => {
                debug!(tx = %tx.hash_str(), kind = tx.input.kind(), reason = %e, "transaction skipped");
                report.rejected.push(Rejection {
                    index,
                    tx_hash: tx.hash,
                    reason: e,
                });
            }
        }
    }

    Ok((minted, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;
    use crate::crypto::Token;
    use crate::wallet::WalletRecord;

    fn funded_pair(registry: &mut WalletRegistry, amount: i64) -> (WalletRecord, WalletRecord) {
        let a = registry.create_wallet().unwrap();
        let b = registry.create_wallet().unwrap();
        registry.credit_wallet(a.public(), units(amount)).unwrap();
        (a, b)
    }

    #[test]
    fn test_transfer_moves_exact_amount() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 100);
        let tx = Transaction::token_transfer(a.private().clone(), b.public().clone(), units(40));

        let (_, report) = apply_transactions(&mut registry, &[tx.clone()], ApplyMode::Lenient).unwrap();
        assert!(report.was_applied(0));
        assert_eq!(registry.balance_of(a.public()), Some(units(60)));
        assert_eq!(registry.balance_of(b.public()), Some(units(40)));
        assert_eq!(registry.total_balance(), units(100));
    }

    #[test]
    fn test_overdraft_is_skipped() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 10);
        let tx = Transaction::token_transfer(a.private().clone(), b.public().clone(), units(11));

        let (_, report) = apply_transactions(&mut registry, &[tx.clone()], ApplyMode::Strict).unwrap();
        assert!(matches!(
            report.rejection_at(0),
            Some(ChainError::InsufficientFunds { .. })
        ));
        assert_eq!(registry.balance_of(a.public()), Some(units(10)));
        assert_eq!(registry.balance_of(b.public()), Some(units(0)));
    }

    #[test]
    fn test_self_and_negative_transfers_are_skipped() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 10);
        let to_self = Transaction::token_transfer(a.private().clone(), a.public().clone(), units(1));
        let negative = Transaction::token_transfer(a.private().clone(), b.public().clone(), units(-5));
        let good = Transaction::token_transfer(a.private().clone(), b.public().clone(), units(3));

        let (_, report) =
            apply_transactions(&mut registry, &[to_self.clone(), negative.clone(), good.clone()], ApplyMode::Lenient)
                .unwrap();
        assert!(matches!(report.rejection_at(0), Some(ChainError::SelfTransfer(_))));
        assert!(matches!(report.rejection_at(1), Some(ChainError::NegativeAmount(_))));
        assert!(report.was_applied(2));
        assert_eq!(registry.balance_of(a.public()), Some(units(7)));
    }

    #[test]
    fn test_unknown_recipient_does_not_debit_sender() {
        let mut registry = WalletRegistry::new();
        let (a, _) = funded_pair(&mut registry, 10);
        let tx = Transaction::token_transfer(a.private().clone(), Token::from("ghost"), units(5));

        let (_, report) = apply_transactions(&mut registry, &[tx.clone()], ApplyMode::Lenient).unwrap();
        assert!(matches!(report.rejection_at(0), Some(ChainError::UnresolvedWallet(_))));
        assert_eq!(registry.balance_of(a.public()), Some(units(10)));
    }

    #[test]
    fn test_strict_mode_aborts_on_unresolved_reference() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 10);
        let good = Transaction::token_transfer(a.private().clone(), b.public().clone(), units(5));
        let ghost = Transaction::credit(Token::from("ghost"), units(1));

        let result = apply_transactions(&mut registry, &[good, ghost], ApplyMode::Strict);
        assert!(matches!(result, Err(ChainError::BlockRejected(_))));
    }

    #[test]
    fn test_mint_and_transfer_nft() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 0);
        let mint = Transaction::nft_mint(
            "X".to_string(),
            "desc".to_string(),
            "https://example.org/x".to_string(),
            a.public().clone(),
        );
        let (minted, _) = apply_transactions(&mut registry, &[mint.clone()], ApplyMode::Lenient).unwrap();
        assert_eq!(minted.len(), 1);
        let id = minted[0].id.clone();
        assert_eq!(minted[0].timestamp, mint.timestamp);
        assert_eq!(registry.get_nft(&id).unwrap().owner, *a.public());

        let transfer = Transaction::nft_transfer(id.clone(), a.private().clone(), b.public().clone());
        apply_transactions(&mut registry, &[transfer], ApplyMode::Lenient).unwrap();
        assert_eq!(registry.get_nft(&id).unwrap().owner, *b.public());
        assert!(!registry.record_by_public(a.public()).unwrap().holds(&id));
        assert!(registry.record_by_public(b.public()).unwrap().holds(&id));
    }

    #[test]
    fn test_nft_transfer_by_non_holder_is_unresolved() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 0);
        let mint = Transaction::nft_mint("X".into(), String::new(), String::new(), a.public().clone());
        let (minted, _) = apply_transactions(&mut registry, &[mint], ApplyMode::Lenient).unwrap();
        let id = minted[0].id.clone();

        let theft = Transaction::nft_transfer(id.clone(), b.private().clone(), b.public().clone());
        let (_, report) = apply_transactions(&mut registry, &[theft.clone()], ApplyMode::Lenient).unwrap();
        assert!(matches!(report.rejection_at(0), Some(ChainError::UnresolvedAsset(_))));
        assert_eq!(registry.get_nft(&id).unwrap().owner, *a.public());
    }

    #[test]
    fn test_genesis_sentinel_stops_processing() {
        let mut registry = WalletRegistry::new();
        let (_, b) = funded_pair(&mut registry, 0);
        let txs = [Transaction::genesis(0), Transaction::credit(b.public().clone(), units(5))];
        let (_, report) = apply_transactions(&mut registry, &txs, ApplyMode::Lenient).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(registry.balance_of(b.public()), Some(units(0)));
    }

    #[test]
    fn test_identical_transactions_reported_by_position() {
        let mut registry = WalletRegistry::new();
        let (a, b) = funded_pair(&mut registry, 10);
        let tx = Transaction::token_transfer(a.private().clone(), b.public().clone(), units(6));
        let twin = tx.clone();
        assert_eq!(tx.hash, twin.hash);

        let (_, report) = apply_transactions(&mut registry, &[tx, twin], ApplyMode::Lenient).unwrap();
        assert!(report.was_applied(0));
        assert!(report.rejection_at(0).is_none());
        assert!(!report.was_applied(1));
        assert!(matches!(report.rejection_at(1), Some(ChainError::InsufficientFunds { .. })));
        assert_eq!(registry.balance_of(a.public()), Some(units(4)));
    }
}
