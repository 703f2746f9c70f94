//! Text tokenizer shared by indexing and query parsing.
//!
//! - Lowercase
//! - Split on any non-alphanumeric character
//! - Drop tokens shorter than 2 characters and English stopwords
//! - Deduplicate (order is irrelevant; a sorted set is returned)
//!
//! No stemming or fuzzy expansion is applied.

use std::collections::BTreeSet;

const MIN_TERM_LEN: usize = 2;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "if", "in", "into", "is", "it", "its", "me", "my", "no", "not",
    "of", "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "to", "too", "us", "very", "was", "we", "were", "what",
    "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

pub fn is_stopword(term: &str) -> bool {
    STOPWORDS.binary_search(&term).is_ok()
}

/// Turn raw text (body, title or URL) into its term set.
///
/// ```rust
/// use page_harness_core::tokenize::tokenize;
///
/// let terms = tokenize("The wild fox, the WILD fox!");
/// assert_eq!(terms.into_iter().collect::<Vec<_>>(), vec!["fox", "wild"]);
/// ```
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() >= MIN_TERM_LEN && !is_stopword(s))
        .map(String::from)
        .collect()
}

/// Tokenize optional text; `None` yields an empty set.
pub fn tokenize_opt(text: Option<&str>) -> BTreeSet<String> {
    text.map(tokenize).unwrap_or_default()
}
