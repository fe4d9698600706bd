//! Sentence splitting on terminal punctuation.

use once_cell::sync::Lazy;
use regex::Regex;

/// One or more of `.!?` followed by whitespace.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("sentence pattern is valid"));

/// Split text into sentences, keeping the terminal punctuation with each one.
///
/// Trailing text without terminal punctuation is kept as a final sentence.
/// Sentences are trimmed and empty ones dropped.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = m.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}
