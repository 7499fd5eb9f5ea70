//! Keyword extraction feeding the memory store's inverted index.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word pattern compiles"));

/// Short function words that carry no retrieval signal.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Extracts index keywords from free text.
///
/// Tokens are lowercased word characters, deduplicated, filtered to length
/// greater than two, minus the stopword set.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|word| word.as_str().to_string())
        .filter(|word| word.len() > 2 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// Extracts keywords from stored content.
///
/// String content is indexed directly; structured content is indexed from its
/// compact JSON rendering, so object keys and nested strings all participate.
pub fn content_keywords(content: &Value) -> HashSet<String> {
    match content {
        Value::String(text) => extract_keywords(text),
        other => extract_keywords(&other.to_string()),
    }
}
