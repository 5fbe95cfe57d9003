//! Proof-of-work.
//!
//! A proof is valid when `SHA-256("{last_proof}{proof}")`, rendered as hex,
//! starts with `difficulty` zero nibbles. The search is a single-threaded
//! scan from zero, so it is deterministic for a given predecessor proof and
//! always terminates; expected work is about `16^difficulty` hashes.

use crate::crypto::sha256;
use crate::error::ChainError;

/// Upper bound on difficulty, keeping the worst-case seal latency bounded.
pub const MAX_DIFFICULTY: u32 = 6;

pub fn check_difficulty(difficulty: u32) -> Result<(), ChainError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ChainError::InvalidConfig(format!(
            "difficulty {} exceeds maximum {}",
            difficulty, MAX_DIFFICULTY
        )));
    }
    Ok(())
}

/// Counts leading zero nibbles of a digest.
fn leading_zero_nibbles(digest: &[u8]) -> u32 {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

pub fn valid_proof(last_proof: u64, proof: u64, difficulty: u32) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    leading_zero_nibbles(&sha256(guess.as_bytes())) >= difficulty
}

pub fn proof_of_work(last_proof: u64, difficulty: u32) -> u64 {
    let mut proof = 0u64;
    while !valid_proof(last_proof, proof, difficulty) {
        proof += 1;
    }
    tracing::debug!(last_proof, proof, difficulty, "proof of work found");
    proof
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256_hex;

    #[test]
    fn test_leading_zero_nibbles() {
        assert_eq!(leading_zero_nibbles(&[0x00, 0x0f, 0xff]), 3);
        assert_eq!(leading_zero_nibbles(&[0x10]), 0);
        assert_eq!(leading_zero_nibbles(&[0x01]), 1);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x00]), 4);
    }

    #[test]
    fn test_found_proof_matches_hex_prefix() {
        for difficulty in 0..=3 {
            let proof = proof_of_work(100, difficulty);
            let digest = sha256_hex(format!("100{}", proof).as_bytes());
            assert!(digest.starts_with(&"0".repeat(difficulty as usize)));
            assert!(valid_proof(100, proof, difficulty));
        }
    }

    #[test]
    fn test_search_returns_smallest_proof() {
        let proof = proof_of_work(7, 2);
        assert!((0..proof).all(|p| !valid_proof(7, p, 2)));
    }

    #[test]
    fn test_zero_difficulty_accepts_first_candidate() {
        assert_eq!(proof_of_work(42, 0), 0);
    }

    #[test]
    fn test_difficulty_bound() {
        assert!(check_difficulty(MAX_DIFFICULTY).is_ok());
        assert!(check_difficulty(MAX_DIFFICULTY + 1).is_err());
    }
}
