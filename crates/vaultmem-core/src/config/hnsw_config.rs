use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::VaultError;

/// Vector index configuration: HNSW graph shape and embedding dimensionality
/// (spec §4.F, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Max bidirectional connections per node above layer 0.
    pub m: usize,
    /// Number of candidates explored during insertion.
    pub ef_construction: usize,
    /// Number of candidates explored during search (tunable per-query
    /// via an override, see spec §4.F).
    pub ef_search: usize,
    /// Expected embedding dimensionality; inserts of a differing length are
    /// rejected with `DIMENSION_MISMATCH`.
    pub dimensions: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: defaults::DEFAULT_HNSW_M,
            ef_construction: defaults::DEFAULT_HNSW_EF_CONSTRUCTION,
            ef_search: defaults::DEFAULT_HNSW_EF_SEARCH,
            dimensions: defaults::DEFAULT_HNSW_DIMENSIONS,
        }
    }
}

impl HnswConfig {
    /// Max connections at layer 0, per the standard HNSW construction (2*M).
    pub fn m0(&self) -> usize {
        self.m * 2
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.m < defaults::MIN_HNSW_M || self.m > defaults::MAX_HNSW_M {
            return Err(VaultError::ConfigInvalid(format!(
                "hnsw_m must be within [{}, {}]",
                defaults::MIN_HNSW_M,
                defaults::MAX_HNSW_M
            )));
        }
        if self.ef_construction < defaults::MIN_HNSW_EF_CONSTRUCTION {
            return Err(VaultError::ConfigInvalid(format!(
                "hnsw_ef_construction must be >= {}",
                defaults::MIN_HNSW_EF_CONSTRUCTION
            )));
        }
        if self.ef_search < defaults::MIN_HNSW_EF_SEARCH {
            return Err(VaultError::ConfigInvalid(format!(
                "hnsw_ef_search must be >= {}",
                defaults::MIN_HNSW_EF_SEARCH
            )));
        }
        if self.dimensions == 0 {
            return Err(VaultError::ConfigInvalid(
                "hnsw dimensions must be > 0".into(),
            ));
        }
        Ok(())
    }
}
