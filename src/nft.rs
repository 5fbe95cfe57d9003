//! Non-fungible assets.
//!
//! There is no separate NFT index: an asset lives in exactly one wallet's
//! holdings and that location is its ownership record. `owner` mirrors it
//! and is the only field that changes after minting.

use crate::crypto::{Sha256Hash, Token};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAsset {
    pub id: Token,
    pub name: String,
    pub description: String,
    pub url: String,
    pub owner: Token,
    /// Creation time in unix milliseconds, taken from the minting transaction.
    pub timestamp: i64,
}

/// On-disk form of an asset: the asset plus its content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NftRecord {
    #[serde(flatten)]
    pub asset: NftAsset,
    #[serde(default)]
    pub hash: String,
}

impl NftAsset {
    /// Mints a new asset with a freshly generated id.
    pub fn mint(name: String, description: String, url: String, owner: Token, timestamp: i64) -> Self {
        NftAsset {
            id: Token::generate_nft_id(),
            name,
            description,
            url,
            owner,
            timestamp,
        }
    }

    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update(self.description.as_bytes());
        hasher.update(self.url.as_bytes());
        hasher.update(self.owner.as_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }
}

impl From<&NftAsset> for NftRecord {
    fn from(asset: &NftAsset) -> Self {
        NftRecord {
            hash: asset.hash_str(),
            asset: asset.clone(),
        }
    }
}

/// Serde adapter writing asset lists with their content hash attached.
pub(crate) mod with_hash {
    use super::{NftAsset, NftRecord};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(assets: &[NftAsset], serializer: S) -> Result<S::Ok, S::Error> {
        let records: Vec<NftRecord> = assets.iter().map(NftRecord::from).collect();
        records.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<NftAsset>, D::Error> {
        let records = Vec::<NftRecord>::deserialize(deserializer)?;
        Ok(records.into_iter().map(|r| r.asset).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NftAsset {
        NftAsset::mint(
            "X".to_string(),
            "first asset".to_string(),
            "https://example.org/x.png".to_string(),
            Token::from("owner"),
            1_700_000_000_000,
        )
    }

    #[test]
    fn test_mint_assigns_unique_ids() {
        let a = sample();
        let b = sample();
        assert_ne!(a.id, b.id);
        assert!(a.id.as_str().starts_with("0x"));
    }

    #[test]
    fn test_hash_tracks_owner() {
        let mut nft = sample();
        let before = nft.hash();
        nft.owner = Token::from("someone else");
        assert_ne!(before, nft.hash());
    }

    #[test]
    fn test_record_carries_hash() {
        let nft = sample();
        let json = serde_json::to_value(NftRecord::from(&nft)).unwrap();
        assert_eq!(json["hash"], nft.hash_str());
        assert_eq!(json["name"], "X");
        let back: NftRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.asset, nft);
    }
}
