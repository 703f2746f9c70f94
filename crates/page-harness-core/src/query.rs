//! Free-text query parsing.
//!
//! The query string is split on whitespace and each token classified:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `#tag` | require tag |
//! | `-#tag` | exclude tag |
//! | `lorem.com` | require domain or hostname |
//! | `-lorem.com` | exclude domain or hostname |
//! | `-word` | exclude pages containing the word's terms |
//! | anything else | tokenized into required terms |
//!
//! Words go through the same tokenizer as indexed text, so punctuation,
//! single characters and stopwords never become terms.

use std::collections::BTreeSet;

use crate::tokenize::tokenize;
use crate::urls::looks_like_domain;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub terms: BTreeSet<String>,
    pub exclude_terms: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub exclude_tags: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub exclude_domains: BTreeSet<String>,
    /// Positive words were present but none survived tokenization.
    pub words_dropped: bool,
}

impl ParsedQuery {
    /// Nothing in the text constrains the result set.
    pub fn is_blank(&self) -> bool {
        self.terms.is_empty()
            && self.exclude_terms.is_empty()
            && self.tags.is_empty()
            && self.exclude_tags.is_empty()
            && self.domains.is_empty()
            && self.exclude_domains.is_empty()
            && !self.words_dropped
    }

    /// The text asked for something (e.g. only stopwords) that can never
    /// match.
    pub fn is_unsatisfiable(&self) -> bool {
        self.words_dropped
            && self.terms.is_empty()
            && self.tags.is_empty()
            && self.domains.is_empty()
    }
}

pub fn parse_query(text: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut positive_words = false;

    for raw in text.split_whitespace() {
        let raw = raw.trim_matches('"');
        let (negated, token) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if token.is_empty() {
            continue;
        }

        if let Some(tag) = token.strip_prefix('#') {
            if !tag.is_empty() {
                let target = if negated {
                    &mut parsed.exclude_tags
                } else {
                    &mut parsed.tags
                };
                target.insert(tag.to_string());
            }
            continue;
        }

        let lowered = token.to_lowercase();
        let bare = lowered.strip_prefix("www.").unwrap_or(&lowered);
        if looks_like_domain(bare) {
            let target = if negated {
                &mut parsed.exclude_domains
            } else {
                &mut parsed.domains
            };
            target.insert(bare.to_string());
            continue;
        }

        let terms = tokenize(token);
        if negated {
            parsed.exclude_terms.extend(terms);
        } else {
            positive_words = true;
            parsed.terms.extend(terms);
        }
    }

    parsed.words_dropped = positive_words && parsed.terms.is_empty();
    parsed
}
