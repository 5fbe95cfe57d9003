use crate::amount::Amount;
use crate::config::LedgerConfig;
use crate::crypto::{Sha256Hash, Token};
use crate::error::ChainError;
use crate::miner::{proof_of_work, valid_proof};
use crate::nft::NftAsset;
use crate::persistence::{InMemoryPersistence, Persistence};
use crate::transaction::Transaction;
use crate::wallet::{WalletRecord, WalletRegistry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::state::{apply_transactions, ApplyMode, ApplyReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    #[default]
    Pending,
    Applied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    #[serde(with = "crate::crypto::hex_hash")]
    pub previous_hash: Sha256Hash,
    /// Fixed at construction; it is the block's identity.
    #[serde(with = "crate::crypto::hex_hash")]
    pub hash: Sha256Hash,
    pub proof: u64,
    #[serde(default)]
    pub status: BlockStatus,
    /// Assets minted by this block, as they were at mint time.
    #[serde(default, with = "crate::nft::with_hash")]
    pub nft: Vec<NftAsset>,
}

impl Block {
    pub fn compute_hash(timestamp: i64, transactions: &[Transaction], previous_hash: &Sha256Hash) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        for tx in transactions {
            hasher.update(tx.content_hash());
        }
        hasher.update(previous_hash);
        hasher.finalize().into()
    }

    /// Re-derives the hash from the block's current contents.
    pub fn content_hash(&self) -> Sha256Hash {
        Self::compute_hash(self.timestamp, &self.transactions, &self.previous_hash)
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn genesis(timestamp: i64) -> Self {
        let transactions = vec![Transaction::genesis(timestamp)];
        let previous_hash = [0u8; 32];
        Block {
            timestamp,
            hash: Self::compute_hash(timestamp, &transactions, &previous_hash),
            transactions,
            previous_hash,
            proof: 0,
            status: BlockStatus::Applied,
            nft: Vec::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.transactions.first().is_some_and(Transaction::is_genesis)
    }

    /// Builds a block and applies its transactions to `wallets`.
    ///
    /// Application runs against a staged copy of the registry that is only
    /// committed once every transaction has been processed, so a block
    /// rejected in strict mode leaves `wallets` untouched.
    pub fn seal(
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: Sha256Hash,
        proof: u64,
        wallets: &mut WalletRegistry,
        mode: ApplyMode,
    ) -> Result<(Block, ApplyReport), ChainError> {
        let hash = Self::compute_hash(timestamp, &transactions, &previous_hash);

        let mut staged = wallets.clone();
        let (nft, report) = apply_transactions(&mut staged, &transactions, mode)?;
        *wallets = staged;

        let block = Block {
            timestamp,
            transactions,
            previous_hash,
            hash,
            proof,
            status: BlockStatus::Applied,
            nft,
        };
        Ok((block, report))
    }
}

/// Result of handing a transaction to the ledger.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Queued; the batch threshold has not been reached yet.
    Pending { queued: usize, required: usize },
    /// The transaction completed a batch and this block was sealed.
    Sealed { block: Box<Block>, report: ApplyReport },
}

impl SubmitOutcome {
    pub fn sealed_block(&self) -> Option<&Block> {
        match self {
            SubmitOutcome::Sealed { block, .. } => Some(block),
            SubmitOutcome::Pending { .. } => None,
        }
    }
}

/// The ledger: sealed blocks, the pending queue and the wallet registry.
pub struct Blockchain {
    pub name: String,
    pub blocks: Vec<Block>,
    pub difficulty: u32,
    pub min_transactions: usize,
    pub apply_mode: ApplyMode,
    pub(crate) pending: Vec<Transaction>,
    pub(crate) wallets: WalletRegistry,
    pub(crate) persistence: Box<dyn Persistence>,
}

impl Blockchain {
    /// Create a new `Blockchain` using an in-memory persistence backend.
    pub fn new(config: LedgerConfig) -> Result<Self, ChainError> {
        Self::new_with_persistence(config, Box::new(InMemoryPersistence::new()))
    }

    /// Create a new `Blockchain` with the provided persistence backend.
    pub fn new_with_persistence(config: LedgerConfig, persistence: Box<dyn Persistence>) -> Result<Self, ChainError> {
        config.validate()?;
        let genesis = Block::genesis(chrono::Utc::now().timestamp_millis());
        info!(name = %config.name, genesis = %genesis.hash_str(), "created new chain");

        Ok(Blockchain {
            name: config.name,
            blocks: vec![genesis],
            difficulty: config.difficulty,
            min_transactions: config.min_transactions,
            apply_mode: config.apply_mode,
            pending: Vec::new(),
            wallets: WalletRegistry::new(),
            persistence,
        })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn wallets(&self) -> &WalletRegistry {
        &self.wallets
    }

    pub fn config(&self) -> LedgerConfig {
        LedgerConfig {
            name: self.name.clone(),
            difficulty: self.difficulty,
            min_transactions: self.min_transactions,
            apply_mode: self.apply_mode,
        }
    }

    /// Replaces the persistence backend, e.g. after restoring from a snapshot.
    pub fn set_persistence(&mut self, persistence: Box<dyn Persistence>) {
        self.persistence = persistence;
    }

    /// Queues `tx` and seals a block once the batch threshold is met.
    pub fn submit(&mut self, tx: Transaction) -> Result<SubmitOutcome, ChainError> {
        if !self.enqueue(tx)? {
            return Ok(self.queued_outcome());
        }
        let (block, report) = self.seal_block()?;
        Ok(SubmitOutcome::Sealed {
            block: Box::new(block),
            report,
        })
    }

    /// Appends `tx` to the pending queue and returns whether a seal is due.
    /// A queue that stays below the threshold is snapshotted, so queued
    /// transactions survive a restart.
    pub fn enqueue(&mut self, tx: Transaction) -> Result<bool, ChainError> {
        if tx.is_genesis() {
            return Err(ChainError::InvalidTransaction(
                "Genesis transactions cannot be submitted".to_string(),
            ));
        }
        tx.validate_size()?;

        self.pending.push(tx);
        let due = self.seal_due();
        if !due {
            self.persist();
        }
        Ok(due)
    }

    pub fn seal_due(&self) -> bool {
        !self.pending.is_empty() && self.pending.len() >= self.min_transactions
    }

    pub fn queued_outcome(&self) -> SubmitOutcome {
        SubmitOutcome::Pending {
            queued: self.pending.len(),
            required: self.min_transactions,
        }
    }

    /// Proof of the tail block, which the next proof must extend.
    pub fn last_proof(&self) -> Result<u64, ChainError> {
        self.blocks
            .last()
            .map(|b| b.proof)
            .ok_or_else(|| ChainError::InvalidChain("chain has no genesis block".to_string()))
    }

    /// Seals every pending transaction into a new block, mining its proof.
    pub fn seal_block(&mut self) -> Result<(Block, ApplyReport), ChainError> {
        self.check_seal_due()?;
        let proof = proof_of_work(self.last_proof()?, self.difficulty);
        self.seal_with_proof(proof)
    }

    /// Seals every pending transaction with a proof mined elsewhere.
    ///
    /// The queue is taken as a whole, so no transaction can end up in two
    /// blocks. The outcome is snapshotted whether the block is appended or
    /// rejected, since either way the queue has been drained.
    pub fn seal_with_proof(&mut self, proof: u64) -> Result<(Block, ApplyReport), ChainError> {
        self.check_seal_due()?;
        let (previous_hash, last_proof) = match self.blocks.last() {
            Some(last) => (last.hash, last.proof),
            None => return Err(ChainError::InvalidChain("chain has no genesis block".to_string())),
        };
        if !valid_proof(last_proof, proof, self.difficulty) {
            return Err(ChainError::BlockRejected(format!(
                "proof {} does not extend tail proof {} at difficulty {}",
                proof, last_proof, self.difficulty
            )));
        }

        let transactions = std::mem::take(&mut self.pending);
        let count = transactions.len();
        let timestamp = chrono::Utc::now().timestamp_millis();

        let sealed = Block::seal(
            timestamp,
            transactions,
            previous_hash,
            proof,
            &mut self.wallets,
            self.apply_mode,
        );
        let (block, report) = match sealed {
            Ok(sealed) => sealed,
            Err(e) => {
                warn!(discarded = count, "block rejected: {}", e);
                self.persist();
                return Err(e);
            }
        };

        self.blocks.push(block.clone());
        info!(
            height = self.blocks.len() - 1,
            hash = %block.hash_str(),
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "sealed block"
        );
        self.persist();
        Ok((block, report))
    }

    fn check_seal_due(&self) -> Result<(), ChainError> {
        if self.seal_due() {
            return Ok(());
        }
        Err(ChainError::InsufficientTransactions {
            pending: self.pending.len(),
            required: self.min_transactions,
        })
    }

    pub fn transfer(&mut self, from: Token, to: Token, amount: Amount) -> Result<SubmitOutcome, ChainError> {
        self.submit(Transaction::token_transfer(from, to, amount))
    }

    pub fn credit(&mut self, to: Token, amount: Amount) -> Result<SubmitOutcome, ChainError> {
        self.submit(Transaction::credit(to, amount))
    }

    pub fn mint_nft(
        &mut self,
        name: String,
        description: String,
        url: String,
        owner: Token,
    ) -> Result<SubmitOutcome, ChainError> {
        self.submit(Transaction::nft_mint(name, description, url, owner))
    }

    pub fn transfer_nft(&mut self, nft: Token, from: Token, to: Token) -> Result<SubmitOutcome, ChainError> {
        self.submit(Transaction::nft_transfer(nft, from, to))
    }

    /// Registers a new wallet and snapshots the ledger so it survives a
    /// restart before its first transaction.
    pub fn create_wallet(&mut self) -> Result<WalletRecord, ChainError> {
        let record = self.wallets.create_wallet()?;
        self.persist();
        Ok(record)
    }

    /// Finds a sealed transaction by content hash.
    pub fn get_transaction(&self, hash: &Sha256Hash) -> Option<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .find(|tx| &tx.hash == hash)
    }

    /// Writes a snapshot through the persistence backend.
    pub fn sync(&self) -> Result<(), ChainError> {
        self.persistence.save_snapshot(&self.to_snapshot())
    }

    fn persist(&self) {
        if let Err(e) = self.sync() {
            warn!("Failed to persist ledger snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;

    fn ledger(min_transactions: usize) -> Blockchain {
        Blockchain::new(LedgerConfig {
            difficulty: 1,
            min_transactions,
            ..LedgerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_chain_has_genesis() {
        let chain = ledger(1);
        assert_eq!(chain.len(), 1);
        assert!(chain.blocks[0].is_genesis());
        assert_eq!(chain.blocks[0].previous_hash, [0u8; 32]);
        assert_eq!(chain.blocks[0].status, BlockStatus::Applied);
    }

    #[test]
    fn test_rejects_unbounded_difficulty() {
        let result = Blockchain::new(LedgerConfig {
            difficulty: crate::miner::MAX_DIFFICULTY + 1,
            ..LedgerConfig::default()
        });
        assert!(matches!(result, Err(ChainError::InvalidConfig(_))));
    }

    #[test]
    fn test_batching_threshold() {
        let mut chain = ledger(3);
        let a = chain.create_wallet().unwrap();

        for i in 1..3 {
            let outcome = chain.credit(a.public().clone(), units(1)).unwrap();
            assert!(matches!(outcome, SubmitOutcome::Pending { queued, required: 3 } if queued == i));
            assert_eq!(chain.len(), 1);
        }

        let outcome = chain.credit(a.public().clone(), units(1)).unwrap();
        let block = outcome.sealed_block().unwrap();
        assert_eq!(block.transactions.len(), 3);
        assert_eq!(chain.len(), 2);
        assert!(chain.pending().is_empty());
        assert_eq!(chain.wallets().balance_of(a.public()), Some(units(3)));
    }

    #[test]
    fn test_direct_seal_below_threshold_fails() {
        let mut chain = ledger(2);
        assert!(matches!(
            chain.seal_block(),
            Err(ChainError::InsufficientTransactions { pending: 0, required: 2 })
        ));
        let a = chain.create_wallet().unwrap();
        chain.credit(a.public().clone(), units(1)).unwrap();
        assert!(matches!(
            chain.seal_block(),
            Err(ChainError::InsufficientTransactions { pending: 1, required: 2 })
        ));
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn test_sealed_block_links_and_proves() {
        let mut chain = ledger(1);
        let a = chain.create_wallet().unwrap();
        chain.credit(a.public().clone(), units(5)).unwrap();

        let genesis = &chain.blocks[0];
        let block = &chain.blocks[1];
        assert_eq!(block.previous_hash, genesis.hash);
        assert_eq!(block.hash, block.content_hash());
        assert!(crate::miner::valid_proof(genesis.proof, block.proof, 1));
    }

    #[test]
    fn test_strict_block_rejection_discards_batch() {
        let mut chain = Blockchain::new(LedgerConfig {
            difficulty: 1,
            min_transactions: 2,
            apply_mode: ApplyMode::Strict,
            ..LedgerConfig::default()
        })
        .unwrap();
        let a = chain.create_wallet().unwrap();
        chain.credit(a.public().clone(), units(5)).unwrap();
        let result = chain.credit(Token::from("ghost"), units(5));

        assert!(matches!(result, Err(ChainError::BlockRejected(_))));
        assert_eq!(chain.len(), 1);
        assert!(chain.pending().is_empty());
        assert_eq!(chain.wallets().balance_of(a.public()), Some(units(0)));
    }

    fn strict_ledger_with_store(store: InMemoryPersistence) -> Blockchain {
        Blockchain::new_with_persistence(
            LedgerConfig {
                difficulty: 1,
                min_transactions: 2,
                apply_mode: ApplyMode::Strict,
                ..LedgerConfig::default()
            },
            Box::new(store),
        )
        .unwrap()
    }

    fn restored(store: &InMemoryPersistence, live: &Blockchain) -> Blockchain {
        let snapshot = store.load_snapshot().unwrap().expect("snapshot written");
        Blockchain::from_snapshot(snapshot, live.config(), Box::new(InMemoryPersistence::new())).unwrap()
    }

    #[test]
    fn test_queued_transactions_are_snapshotted() {
        let store = InMemoryPersistence::new();
        let mut chain = strict_ledger_with_store(store.clone());
        let a = chain.create_wallet().unwrap();
        chain.credit(a.public().clone(), units(5)).unwrap();
        assert_eq!(chain.pending().len(), 1);

        let restored = restored(&store, &chain);
        assert_eq!(restored.pending().len(), 1);
        assert_eq!(restored.pending()[0].hash, chain.pending()[0].hash);
    }

    #[test]
    fn test_rejected_batch_is_not_restored() {
        let store = InMemoryPersistence::new();
        let mut chain = strict_ledger_with_store(store.clone());
        let a = chain.create_wallet().unwrap();
        chain.credit(a.public().clone(), units(5)).unwrap();
        assert!(chain.credit(Token::from("ghost"), units(5)).is_err());
        assert!(chain.pending().is_empty());

        let restored = restored(&store, &chain);
        assert!(restored.pending().is_empty());
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.wallets().balance_of(a.public()), Some(units(0)));
    }

    #[test]
    fn test_seal_with_stale_proof_is_rejected() {
        let mut chain = ledger(1);
        let a = chain.create_wallet().unwrap();
        let tail = chain.last_proof().unwrap();
        let stale = (0..).find(|p| !crate::miner::valid_proof(tail, *p, 1)).unwrap();

        chain.enqueue(Transaction::credit(a.public().clone(), units(1))).unwrap();
        assert!(matches!(chain.seal_with_proof(stale), Err(ChainError::BlockRejected(_))));
        assert_eq!(chain.pending().len(), 1);

        let proof = proof_of_work(tail, 1);
        chain.seal_with_proof(proof).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.wallets().balance_of(a.public()), Some(units(1)));
    }

    #[test]
    fn test_genesis_payload_cannot_be_submitted() {
        let mut chain = ledger(1);
        assert!(chain.submit(Transaction::genesis(0)).is_err());
        assert!(chain.pending().is_empty());
    }

    #[test]
    fn test_get_transaction() {
        let mut chain = ledger(1);
        let a = chain.create_wallet().unwrap();
        let tx = Transaction::credit(a.public().clone(), units(2));
        let hash = tx.hash;
        chain.submit(tx).unwrap();
        assert_eq!(chain.get_transaction(&hash).unwrap().hash, hash);
        assert!(chain.get_transaction(&[9u8; 32]).is_none());
    }
}
