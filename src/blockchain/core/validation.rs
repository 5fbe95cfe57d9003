use crate::error::ChainError;
use crate::miner::valid_proof;

use super::chain::{Block, Blockchain};

/// Walks the chain re-deriving hashes and checking linkage. Stops at the first
/// mismatch.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainError> {
    let genesis = blocks
        .first()
        .ok_or_else(|| ChainError::InvalidChain("chain is empty".to_string()))?;
    if !genesis.is_genesis() {
        return Err(ChainError::InvalidChain(
            "first block does not carry the genesis sentinel".to_string(),
        ));
    }

    for (height, block) in blocks.iter().enumerate() {
        if height > 0 && block.is_genesis() {
            return Err(ChainError::InvalidChain(format!(
                "block {} carries the genesis sentinel",
                height
            )));
        }

        for tx in &block.transactions {
            if tx.content_hash() != tx.hash {
                return Err(ChainError::InvalidChain(format!(
                    "transaction {} in block {} does not match its contents",
                    tx.hash_str(),
                    height
                )));
            }
        }

        let derived = block.content_hash();
        if derived != block.hash {
            return Err(ChainError::InvalidChain(format!(
                "block {} hash mismatch: stored {}, derived {}",
                height,
                block.hash_str(),
                hex::encode(derived)
            )));
        }

        if height > 0 && block.previous_hash != blocks[height - 1].hash {
            return Err(ChainError::InvalidChain(format!(
                "block {} does not link to block {}: expected {}, got {}",
                height,
                height - 1,
                blocks[height - 1].hash_str(),
                hex::encode(block.previous_hash)
            )));
        }
    }
    Ok(())
}

/// Checks every non-genesis proof against its predecessor at `difficulty`.
pub fn audit_proofs(blocks: &[Block], difficulty: u32) -> Result<(), ChainError> {
    for (height, pair) in blocks.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        if !valid_proof(prev.proof, block.proof, difficulty) {
            return Err(ChainError::InvalidChain(format!(
                "block {} proof {} does not satisfy difficulty {}",
                height + 1,
                block.proof,
                difficulty
            )));
        }
    }
    Ok(())
}

impl Blockchain {
    pub fn validate(&self) -> bool {
        self.validate_chain().is_ok()
    }

    pub fn validate_chain(&self) -> Result<(), ChainError> {
        validate_chain(&self.blocks)
    }

    pub fn audit_proofs(&self) -> Result<(), ChainError> {
        audit_proofs(&self.blocks, self.difficulty)
    }
}
