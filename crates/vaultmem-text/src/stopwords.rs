//! The fixed English stop-word list used by [`crate::tokenizer`] (spec §4.G).
//!
//! Exact membership is part of the spec: BM25 rankings must be reproducible
//! across implementations, so this list is frozen rather than configurable
//! per store. Changing it requires bumping the text-index snapshot format
//! (spec §9).

use std::collections::HashSet;
use std::sync::OnceLock;

/// The 60-word stop list (spec §4.G: "at least the 60-word set in the
/// source").
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "being", "but", "by", "can", "did", "do",
    "does", "doing", "for", "from", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "my", "of",
    "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "to", "was", "we", "were", "what", "when", "where", "which",
    "who", "why", "will", "with", "would", "you", "your",
];

fn stop_word_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Whether `token` (already lowercased) is in the fixed stop list.
pub fn is_stop_word(token: &str) -> bool {
    stop_word_set().contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_has_at_least_sixty_words() {
        assert!(STOP_WORDS.len() >= 60);
    }

    #[test]
    fn common_function_words_are_stopped() {
        for w in ["the", "a", "and", "of", "is", "to"] {
            assert!(is_stop_word(w), "{w} should be a stop word");
        }
    }

    #[test]
    fn content_words_are_not_stopped() {
        for w in ["fox", "dog", "vaultmem", "memory", "hash"] {
            assert!(!is_stop_word(w), "{w} should not be a stop word");
        }
    }
}
