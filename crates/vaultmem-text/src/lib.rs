//! # vaultmem-text
//!
//! An inverted index over live memory content, scored with BM25 (spec
//! §4.G). Only the latest, non-deleted version of a memory contributes
//! postings; `add`/`remove` keep the index a pure derived view over the log.

pub mod stopwords;
pub mod tokenizer;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use vaultmem_core::constants::INDEX_SNAPSHOT_VERSION;
use vaultmem_core::errors::TextIndexError;

/// BM25 tuning parameters and tokenizer options (spec §4.G, §6).
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub min_token_length: usize,
    pub remove_stop_words: bool,
}

/// Optional metadata folded into the indexable text alongside `content`
/// (spec §4.G `add`): `content ++ category ++ type ++ tags ++ context`.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub category: Option<String>,
    pub doc_type: Option<String>,
    pub tags: Vec<String>,
    pub context: Option<String>,
}

impl DocumentMetadata {
    fn append_to(&self, content: &str) -> String {
        let mut s = String::from(content);
        if let Some(category) = &self.category {
            s.push(' ');
            s.push_str(category);
        }
        if let Some(doc_type) = &self.doc_type {
            s.push(' ');
            s.push_str(doc_type);
        }
        if !self.tags.is_empty() {
            s.push(' ');
            s.push_str(&self.tags.join(" "));
        }
        if let Some(context) = &self.context {
            s.push(' ');
            s.push_str(context);
        }
        s
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    frequency: u32,
    positions: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct DocEntry {
    length: u32,
    terms: Vec<String>,
}

/// An inverted index over live document content, BM25-scored (spec §4.G).
#[derive(Debug, Serialize, Deserialize)]
pub struct TextIndex {
    k1: f64,
    b: f64,
    min_token_length: usize,
    remove_stop_words: bool,
    /// `term -> (doc_id -> posting)`.
    postings: HashMap<String, HashMap<String, Posting>>,
    docs: HashMap<String, DocEntry>,
    total_tokens: u64,
}

impl TextIndex {
    pub fn new(params: Bm25Params) -> Self {
        TextIndex {
            k1: params.k1,
            b: params.b,
            min_token_length: params.min_token_length,
            remove_stop_words: params.remove_stop_words,
            postings: HashMap::new(),
            docs: HashMap::new(),
            total_tokens: 0,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    fn avg_doc_length(&self) -> f64 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_tokens as f64 / self.docs.len() as f64
        }
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        tokenizer::tokenize_and_filter(text, self.min_token_length, self.remove_stop_words)
    }

    /// Index (or re-index) `id`'s content plus any metadata (spec §4.G
    /// `add`). If `id` is already present, its prior postings are removed
    /// first.
    pub fn add(&mut self, id: &str, content: &str, metadata: Option<&DocumentMetadata>) {
        if self.docs.contains_key(id) {
            self.remove(id);
        }

        let indexable = match metadata {
            Some(meta) => meta.append_to(content),
            None => content.to_string(),
        };
        let tokens = self.tokenize(&indexable);
        if tokens.is_empty() {
            self.docs.insert(id.to_string(), DocEntry::default());
            return;
        }

        let mut term_entries: HashMap<String, Vec<u32>> = HashMap::new();
        for (position, term) in tokens.iter().enumerate() {
            term_entries.entry(term.clone()).or_default().push(position as u32);
        }

        let mut terms: Vec<String> = term_entries.keys().cloned().collect();
        terms.sort();

        for (term, positions) in term_entries {
            self.postings.entry(term).or_default().insert(
                id.to_string(),
                Posting { frequency: positions.len() as u32, positions },
            );
        }

        self.total_tokens += tokens.len() as u64;
        self.docs.insert(
            id.to_string(),
            DocEntry { length: tokens.len() as u32, terms },
        );
    }

    /// Remove `id` and every posting it contributed (spec §4.G `remove`).
    /// A term that loses its last document is dropped entirely.
    pub fn remove(&mut self, id: &str) {
        let Some(entry) = self.docs.remove(id) else { return };
        self.total_tokens = self.total_tokens.saturating_sub(entry.length as u64);
        for term in &entry.terms {
            if let Some(docs) = self.postings.get_mut(term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    fn idf(&self, df: usize) -> f64 {
        let n = self.docs.len() as f64;
        let df = df as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn bm25_term_score(&self, tf: u32, doc_len: u32, idf: f64) -> f64 {
        let tf = tf as f64;
        let avg_len = self.avg_doc_length().max(f64::EPSILON);
        let denom = tf + self.k1 * (1.0 - self.b + self.b * (doc_len as f64 / avg_len));
        idf * (tf * (self.k1 + 1.0)) / denom
    }

    /// BM25 search (spec §4.G). An empty (post-filter) query returns `[]`.
    /// `match_all` drops any document that didn't match every query term.
    pub fn search(&self, query: &str, limit: usize, match_all: bool) -> Vec<(String, f64)> {
        let query_terms: Vec<String> = {
            let mut terms = self.tokenize(query);
            terms.sort();
            terms.dedup();
            terms
        };
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<String, f64> = HashMap::new();
        let mut matched_terms: HashMap<String, usize> = HashMap::new();

        for term in &query_terms {
            let Some(docs) = self.postings.get(term) else { continue };
            let idf = self.idf(docs.len());
            for (doc_id, posting) in docs {
                let doc_len = self.docs.get(doc_id).map(|d| d.length).unwrap_or(0);
                let contribution = self.bm25_term_score(posting.frequency, doc_len, idf);
                *scores.entry(doc_id.clone()).or_default() += contribution;
                *matched_terms.entry(doc_id.clone()).or_default() += 1;
            }
        }

        let mut candidates: Vec<(String, f64)> = scores
            .into_iter()
            .filter(|(id, _)| {
                !match_all || matched_terms.get(id).copied().unwrap_or(0) == query_terms.len()
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Persist the inverted index and document table (spec §6 `text.idx`).
    pub fn save(&self, path: &Path) -> Result<(), TextIndexError> {
        let file = File::create(path).map_err(|e| TextIndexError::InvalidParameter {
            name: "path".into(),
            reason: e.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&INDEX_SNAPSHOT_VERSION.to_le_bytes())
            .map_err(|e| TextIndexError::InvalidParameter { name: "path".into(), reason: e.to_string() })?;
        serde_json::to_writer(&mut writer, self).map_err(|e| TextIndexError::InvalidParameter {
            name: "snapshot".into(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Load a snapshot written by [`Self::save`]. Fails loudly on an unknown
    /// format version.
    pub fn load(path: &Path) -> Result<Self, TextIndexError> {
        let file = File::open(path).map_err(|e| TextIndexError::InvalidParameter {
            name: "path".into(),
            reason: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);
        let mut version_bytes = [0u8; 4];
        reader
            .read_exact(&mut version_bytes)
            .map_err(|e| TextIndexError::InvalidParameter { name: "path".into(), reason: e.to_string() })?;
        let version = u32::from_le_bytes(version_bytes);
        if version != INDEX_SNAPSHOT_VERSION {
            return Err(TextIndexError::UnsupportedVersion { version });
        }
        serde_json::from_reader(reader).map_err(|e| TextIndexError::InvalidParameter {
            name: "snapshot".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Bm25Params {
        Bm25Params { k1: 1.2, b: 0.75, min_token_length: 1, remove_stop_words: false }
    }

    #[test]
    fn more_frequent_term_ranks_higher() {
        let mut idx = TextIndex::new(params());
        idx.add("a", "fox fox fox", None);
        idx.add("b", "fox", None);
        idx.add("c", "dog", None);

        let results = idx.search("fox", 10, false);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let mut idx = TextIndex::new(params());
        idx.add("a", "fox", None);
        assert!(idx.search("", 10, false).is_empty());
        assert!(idx.search("   ", 10, false).is_empty());
    }

    #[test]
    fn match_all_drops_partial_matches() {
        let mut idx = TextIndex::new(params());
        idx.add("a", "fox and dog", None);
        idx.add("b", "fox only", None);

        let any = idx.search("fox dog", 10, false);
        assert_eq!(any.len(), 2);

        let all = idx.search("fox dog", 10, true);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "a");
    }

    #[test]
    fn remove_drops_term_posting_entirely_when_last_doc_goes() {
        let mut idx = TextIndex::new(params());
        idx.add("a", "unique_term", None);
        assert!(idx.search("unique_term", 10, false).len() == 1);
        idx.remove("a");
        assert!(idx.search("unique_term", 10, false).is_empty());
        assert!(!idx.contains("a"));
    }

    #[test]
    fn reindexing_replaces_prior_content() {
        let mut idx = TextIndex::new(params());
        idx.add("a", "alpha", None);
        idx.add("a", "beta", None);
        assert!(idx.search("alpha", 10, false).is_empty());
        assert_eq!(idx.search("beta", 10, false)[0].0, "a");
    }

    #[test]
    fn metadata_is_folded_into_indexable_text() {
        let mut idx = TextIndex::new(params());
        let meta = DocumentMetadata {
            category: Some("people".into()),
            doc_type: Some("person".into()),
            tags: vec!["friend".into()],
            context: Some("work".into()),
        };
        idx.add("a", "Alice", Some(&meta));
        assert_eq!(idx.search("friend", 10, false)[0].0, "a");
        assert_eq!(idx.search("work", 10, false)[0].0, "a");
    }

    #[test]
    fn ties_break_on_id_ascending() {
        let mut idx = TextIndex::new(params());
        idx.add("z", "fox", None);
        idx.add("a", "fox", None);
        let results = idx.search("fox", 10, false);
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "z");
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.idx");
        let mut idx = TextIndex::new(params());
        idx.add("a", "fox fox fox", None);
        idx.add("b", "fox", None);
        idx.save(&path).unwrap();

        let loaded = TextIndex::load(&path).unwrap();
        let results = loaded.search("fox", 10, false);
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn stop_words_removed_when_enabled() {
        let mut idx = TextIndex::new(Bm25Params { remove_stop_words: true, ..params() });
        idx.add("a", "the quick fox", None);
        assert!(idx.search("the", 10, false).is_empty());
        assert_eq!(idx.search("quick", 10, false)[0].0, "a");
    }
}
