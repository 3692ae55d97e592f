//! Hybrid search (spec §4.H "Search"): merge HNSW and BM25 candidate lists,
//! normalize each side by its own maximum, and combine by `semantic_weight`.

use std::collections::HashMap;

use vaultmem_core::config::SearchConfig;
use vaultmem_core::errors::VaultResult;
use vaultmem_core::record::Memory;
use vaultmem_core::traits::Embedder;

use crate::instance::StoreInstance;
use crate::read::get_memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Text,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: String,
    pub mode: SearchMode,
    pub limit: usize,
    pub semantic_weight: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions { query: String::new(), mode: SearchMode::Hybrid, limit: 10, semantic_weight: 0.7 }
    }
}

impl SearchOptions {
    /// Build search options for `query`, falling back to the store's
    /// configured [`SearchConfig::semantic_weight`] rather than this
    /// struct's own per-call default (spec §6 config vs. §4.H per-request
    /// default are distinct knobs: this constructor is how a caller opts
    /// into the store-level one instead of hardcoding 0.7 themselves).
    pub fn from_config(config: &SearchConfig, query: impl Into<String>, mode: SearchMode, limit: usize) -> Self {
        SearchOptions { query: query.into(), mode, limit, semantic_weight: config.semantic_weight }
    }
}

/// One ranked result: the memory plus its combined and per-side scores
/// (spec §4.H step 6 `_searchScore`/`_semanticScore`/`_textScore`).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub memory: Memory,
    pub search_score: f64,
    pub semantic_score: f64,
    pub text_score: f64,
}

struct Candidate {
    semantic: f64,
    text: f64,
}

pub fn search(
    instance: &mut StoreInstance,
    options: &SearchOptions,
    embedder: Option<&dyn Embedder>,
) -> VaultResult<Vec<SearchResult>> {
    let fanout = options.limit.saturating_mul(2).max(1);
    let mut candidates: HashMap<String, Candidate> = HashMap::new();

    if matches!(options.mode, SearchMode::Semantic | SearchMode::Hybrid) {
        if let Some(embedder) = embedder {
            let q_vec = embedder.embed(&options.query)?;
            if let Ok(hits) = instance.vector.search(&q_vec, fanout, None) {
                for (id, score) in hits {
                    candidates.entry(id).or_insert(Candidate { semantic: 0.0, text: 0.0 }).semantic = score as f64;
                }
            }
        }
    }

    if matches!(options.mode, SearchMode::Text | SearchMode::Hybrid) {
        for (id, score) in instance.text.search(&options.query, fanout, false) {
            candidates.entry(id).or_insert(Candidate { semantic: 0.0, text: 0.0 }).text = score;
        }
    }

    let max_semantic = candidates.values().map(|c| c.semantic).fold(0.0_f64, f64::max);
    let max_text = candidates.values().map(|c| c.text).fold(0.0_f64, f64::max);

    let mut scored: Vec<(String, f64, f64, f64)> = candidates
        .into_iter()
        .map(|(id, c)| {
            let norm_sem = if max_semantic > 0.0 { c.semantic / max_semantic } else { 0.0 };
            let norm_txt = if max_text > 0.0 { c.text / max_text } else { 0.0 };
            let combined = match options.mode {
                SearchMode::Semantic => norm_sem,
                SearchMode::Text => norm_txt,
                SearchMode::Hybrid => {
                    options.semantic_weight * norm_sem + (1.0 - options.semantic_weight) * norm_txt
                }
            };
            (id, combined, norm_sem, norm_txt)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(options.limit);

    let mut out = Vec::with_capacity(scored.len());
    for (id, combined, norm_sem, norm_txt) in scored {
        if let Some(memory) = get_memory(instance, &id)? {
            out.push(SearchResult {
                memory,
                search_score: combined,
                semantic_score: norm_sem,
                text_score: norm_txt,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_hybrid_with_limit_ten() {
        let opts = SearchOptions::default();
        assert_eq!(opts.mode, SearchMode::Hybrid);
        assert_eq!(opts.limit, 10);
        assert!((opts.semantic_weight - 0.7).abs() < f64::EPSILON);
    }
}
