use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::VaultError;
use crate::record::HashAlgorithm;

/// Merkle-tree configuration — the hash algorithm named here also governs
/// record content hashing (spec §3, §4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MerkleConfig {
    pub hash_algorithm: String,
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: defaults::DEFAULT_MERKLE_HASH_ALGORITHM.to_string(),
        }
    }
}

impl MerkleConfig {
    pub fn algorithm(&self) -> Result<HashAlgorithm, VaultError> {
        HashAlgorithm::parse(&self.hash_algorithm).ok_or_else(|| {
            VaultError::ConfigInvalid(format!(
                "merkle_hash_algorithm must be one of sha256/sha384/sha512, got {}",
                self.hash_algorithm
            ))
        })
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        self.algorithm().map(|_| ())
    }
}
