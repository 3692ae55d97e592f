use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::VaultError;

/// BM25 text index configuration (spec §4.G, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextIndexConfig {
    /// BM25 term-frequency saturation parameter.
    pub k1: f64,
    /// BM25 length-normalization parameter.
    pub b: f64,
    /// Tokens shorter than this (after lowercasing, before stop-word
    /// filtering) are dropped.
    pub min_token_length: usize,
    /// Whether the fixed stop-word list is applied (spec §6
    /// `text_index_stop_words`, default on).
    pub stop_words: bool,
}

impl Default for TextIndexConfig {
    fn default() -> Self {
        Self {
            k1: defaults::DEFAULT_BM25_K1,
            b: defaults::DEFAULT_BM25_B,
            min_token_length: defaults::DEFAULT_TEXT_INDEX_MIN_TOKEN_LENGTH,
            stop_words: true,
        }
    }
}

impl TextIndexConfig {
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.min_token_length < 1 {
            return Err(VaultError::ConfigInvalid(
                "text_index_min_token_length must be >= 1".into(),
            ));
        }
        if self.k1 < 0.0 {
            return Err(VaultError::ConfigInvalid("bm25 k1 must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(VaultError::ConfigInvalid("bm25 b must be within [0, 1]".into()));
        }
        Ok(())
    }
}
