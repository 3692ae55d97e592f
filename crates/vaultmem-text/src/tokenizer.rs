//! Tokenization for the BM25 text index (spec §4.G).
//!
//! The split class and stop-word list are part of the spec, not an
//! implementation detail: BM25 rankings are reproducible only if every
//! implementation tokenizes identically (spec §9 "Stop-word list and
//! tokenizer are test inputs").

use crate::stopwords::is_stop_word;

/// True for any byte in the fixed punctuation/whitespace split class:
/// `[\s\-_.,!?;:'"()\[\]{}|\\/<>@#$%^&*+=~\x60]`. Everything else —
/// including non-ASCII letters — is kept verbatim inside a token.
fn is_split_char(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '-' | '_'
                | '.'
                | ','
                | '!'
                | '?'
                | ';'
                | ':'
                | '\''
                | '"'
                | '('
                | ')'
                | '['
                | ']'
                | '{'
                | '}'
                | '|'
                | '\\'
                | '/'
                | '<'
                | '>'
                | '@'
                | '#'
                | '$'
                | '%'
                | '^'
                | '&'
                | '*'
                | '+'
                | '='
                | '~'
                | '`'
        )
}

/// Lowercase and split on the fixed class, discarding empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(is_split_char)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Tokenize, then drop tokens shorter than `min_token_length` and (if
/// `remove_stop_words`) any token in the fixed stop list.
pub fn tokenize_and_filter(text: &str, min_token_length: usize, remove_stop_words: bool) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= min_token_length)
        .filter(|t| !remove_stop_words || !is_stop_word(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_whitespace() {
        let tokens = tokenize("Hello, World! This is vaultmem's test.");
        assert_eq!(
            tokens,
            vec!["hello", "world", "this", "is", "vaultmem", "s", "test"]
        );
    }

    #[test]
    fn empty_tokens_are_discarded() {
        let tokens = tokenize("  multiple   spaces -- and--dashes  ");
        assert_eq!(tokens, vec!["multiple", "spaces", "and", "dashes"]);
    }

    #[test]
    fn unicode_letter_runs_are_preserved_verbatim() {
        let tokens = tokenize("caf\u{e9} na\u{ef}ve");
        assert_eq!(tokens, vec!["caf\u{e9}", "na\u{ef}ve"]);
    }

    #[test]
    fn min_token_length_drops_short_tokens() {
        let tokens = tokenize_and_filter("a fox is in a box", 2, false);
        assert_eq!(tokens, vec!["fox", "in", "box"]);
    }

    #[test]
    fn stop_words_are_removed_when_enabled() {
        let tokens = tokenize_and_filter("the quick fox and the dog", 1, true);
        assert_eq!(tokens, vec!["quick", "fox", "dog"]);
    }
}
