//! Hashing and bearer-token primitives.
//!
//! Wallet "keys" are opaque bearer tokens: the hex SHA-256 digest of random
//! bytes. A private token and its public token have no mathematical
//! relationship and nothing here produces or verifies signatures. Holding the
//! private token string is what authorizes a spend.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub type Sha256Hash = [u8; 32];

/// Length of a token in hex characters.
pub const TOKEN_HEX_LEN: usize = 64;

/// Prefix carried by NFT identifiers.
pub const NFT_ID_PREFIX: &str = "0x";

pub fn sha256(data: &[u8]) -> Sha256Hash {
    Sha256::digest(data).into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// An opaque bearer token identifying a wallet or an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Draws 32 bytes from the OS RNG and hashes them.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Token(sha256_hex(&seed))
    }

    /// A fresh NFT identifier (`0x` followed by a random token).
    pub fn generate_nft_id() -> Self {
        Token(format!("{}{}", NFT_ID_PREFIX, Self::generate().0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token(s)
    }
}

/// Private/public token pair for one wallet. Serialized with the short
/// `pve`/`pbc` field names used by the snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(rename = "pve")]
    pub private: Token,
    #[serde(rename = "pbc")]
    pub public: Token,
}

impl KeyPair {
    pub fn generate() -> Self {
        KeyPair {
            private: Token::generate(),
            public: Token::generate(),
        }
    }

    pub fn new(private: impl Into<Token>, public: impl Into<Token>) -> Self {
        KeyPair {
            private: private.into(),
            public: public.into(),
        }
    }

    /// True when either token of `other` equals either token of `self`.
    pub fn collides_with(&self, other: &KeyPair) -> bool {
        let mine = [&self.private, &self.public];
        let theirs = [&other.private, &other.public];
        mine.iter().any(|a| theirs.contains(a))
    }
}

/// Serde adapter storing a [`Sha256Hash`] as lowercase hex.
pub mod hex_hash {
    use super::Sha256Hash;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Sha256Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    /// Accepts an empty string as the all-zero hash, which is how a genesis
    /// block with no predecessor is written.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Sha256Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok([0u8; 32]);
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(&s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let token = Token::generate();
        assert_eq!(token.as_str().len(), TOKEN_HEX_LEN);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, Token::generate());
    }

    #[test]
    fn test_nft_id_prefix() {
        let id = Token::generate_nft_id();
        assert!(id.as_str().starts_with(NFT_ID_PREFIX));
        assert_eq!(id.as_str().len(), NFT_ID_PREFIX.len() + TOKEN_HEX_LEN);
    }

    #[test]
    fn test_keypair_serializes_with_short_names() {
        let pair = KeyPair::new("aa", "bb");
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["pve"], "aa");
        assert_eq!(json["pbc"], "bb");
    }

    #[test]
    fn test_collision_detection_is_cross_field() {
        let a = KeyPair::new("x", "y");
        assert!(a.collides_with(&KeyPair::new("y", "z")));
        assert!(a.collides_with(&KeyPair::new("q", "x")));
        assert!(!a.collides_with(&KeyPair::new("p", "q")));
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
