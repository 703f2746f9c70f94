//! Prefix suggestions over the domain and tag value indices.

use std::fmt;
use std::str::FromStr;

use crate::index::{PostingsIndex, ValueField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestField {
    Domain,
    Tag,
}

impl SuggestField {
    fn value_field(self) -> ValueField {
        match self {
            SuggestField::Domain => ValueField::Domain,
            SuggestField::Tag => ValueField::Tag,
        }
    }
}

impl FromStr for SuggestField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "domain" => Ok(SuggestField::Domain),
            "tag" | "tags" => Ok(SuggestField::Tag),
            other => anyhow::bail!("Unknown suggest field: {}. Use domain or tag.", other),
        }
    }
}

impl fmt::Display for SuggestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestField::Domain => write!(f, "domain"),
            SuggestField::Tag => write!(f, "tag"),
        }
    }
}

/// Live values of `field` starting with `prefix` (case-insensitive),
/// ascending, at most `limit` of them.
pub fn suggest(index: &PostingsIndex, prefix: &str, field: SuggestField, limit: usize) -> Vec<String> {
    let prefix = prefix.trim().to_lowercase();
    index
        .values(field.value_field())
        .into_iter()
        .filter(|value| value.to_lowercase().starts_with(&prefix))
        .take(limit)
        .collect()
}
