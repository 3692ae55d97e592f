//! Configuration for a vaultmem store (spec §6). Mirrors the teacher's
//! per-subsystem nested-config pattern: each concern gets its own struct
//! and `defaults` module, composed into one top-level [`VaultConfig`].

pub mod defaults;
mod hnsw_config;
mod merkle_config;
mod search_config;
mod storage_config;
mod text_config;

pub use hnsw_config::HnswConfig;
pub use merkle_config::MerkleConfig;
pub use search_config::SearchConfig;
pub use storage_config::StorageConfig;
pub use text_config::TextIndexConfig;

use serde::{Deserialize, Serialize};

use crate::errors::VaultError;

/// Top-level vaultmem configuration, loaded from TOML at store-open time
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub hnsw: HnswConfig,
    pub text_index: TextIndexConfig,
    pub merkle: MerkleConfig,
    pub search: SearchConfig,
}

impl VaultConfig {
    /// Parse a TOML document into a [`VaultConfig`], applying per-field
    /// defaults for anything omitted.
    pub fn from_toml_str(s: &str) -> Result<Self, VaultError> {
        let cfg: VaultConfig =
            toml::from_str(s).map_err(|e| VaultError::ConfigInvalid(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate every nested config, per the constraints table in spec §6.
    pub fn validate(&self) -> Result<(), VaultError> {
        self.storage.validate()?;
        self.hnsw.validate()?;
        self.text_index.validate()?;
        self.merkle.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(VaultConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_data_dir_is_rejected() {
        let mut cfg = VaultConfig::default();
        cfg.storage.data_dir = "".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hnsw_m_out_of_range_is_rejected() {
        let mut cfg = VaultConfig::default();
        cfg.hnsw.m = 1;
        assert!(cfg.validate().is_err());
        cfg.hnsw.m = 1000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_hash_algorithm_is_rejected() {
        let mut cfg = VaultConfig::default();
        cfg.merkle.hash_algorithm = "md5".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_toml_str_applies_defaults_for_omitted_sections() {
        let cfg = VaultConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.hnsw.m, defaults::DEFAULT_HNSW_M);
    }
}
