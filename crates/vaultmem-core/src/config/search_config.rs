use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::VaultError;

/// Hybrid search weighting (spec §4.H "hybrid search"). The text side's
/// weight is always `1 - semantic_weight` — the spec's combination formula
/// (`w·norm_sem + (1−w)·norm_txt`) takes a single knob, not two independent
/// ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Weight applied to the normalized semantic (HNSW) score; the text
    /// side gets `1.0 - semantic_weight`.
    pub semantic_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { semantic_weight: defaults::DEFAULT_SEMANTIC_WEIGHT }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), VaultError> {
        if !(0.0..=1.0).contains(&self.semantic_weight) {
            return Err(VaultError::ConfigInvalid(
                "semantic_weight must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
