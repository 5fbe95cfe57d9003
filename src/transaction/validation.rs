/// Stateless checks for transactions, separated from type definitions.
///
/// Nothing here consults the wallet registry. Balance, ownership and
/// self-transfer checks need state and live in the block application step.
use crate::amount::ZERO;
use crate::error::ChainError;
use crate::transaction::types::{Payload, Transaction, MAX_TRANSACTION_SIZE};

pub const MAX_NAME_LENGTH: usize = 128;
pub const MAX_DESCRIPTION_LENGTH: usize = 2048;
pub const MAX_URL_LENGTH: usize = 2048;

impl Transaction {
    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }

    /// Field-level checks an API adapter runs before submitting.
    pub fn validate_fields(&self) -> Result<(), ChainError> {
        self.validate_size()?;

        match &self.input {
            Payload::Genesis => Err(ChainError::InvalidTransaction(
                "Genesis transactions cannot be submitted".to_string(),
            )),
            Payload::TokenTransfer(tx) => {
                if tx.from.is_empty() || tx.to.is_empty() {
                    return Err(ChainError::InvalidTransaction(
                        "Transfer endpoints cannot be empty".to_string(),
                    ));
                }
                if tx.amount < ZERO {
                    return Err(ChainError::NegativeAmount(tx.amount));
                }
                Ok(())
            }
            Payload::NftTransfer(tx) => {
                if tx.nft.is_empty() || tx.from.is_empty() || tx.to.is_empty() {
                    return Err(ChainError::InvalidTransaction(
                        "NFT transfer fields cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Payload::NftMint(tx) => {
                if tx.owner.is_empty() {
                    return Err(ChainError::InvalidTransaction(
                        "NFT owner cannot be empty".to_string(),
                    ));
                }
                check_len("name", &tx.name, MAX_NAME_LENGTH)?;
                check_len("description", &tx.description, MAX_DESCRIPTION_LENGTH)?;
                check_len("url", &tx.url, MAX_URL_LENGTH)
            }
            Payload::Credit(tx) => {
                if tx.to.is_empty() {
                    return Err(ChainError::InvalidTransaction(
                        "Credit recipient cannot be empty".to_string(),
                    ));
                }
                if tx.amount < ZERO {
                    return Err(ChainError::NegativeAmount(tx.amount));
                }
                Ok(())
            }
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), ChainError> {
    if value.len() > max {
        return Err(ChainError::InvalidTransaction(format!(
            "NFT {} exceeds maximum length of {} characters",
            field, max
        )));
    }
    Ok(())
}
