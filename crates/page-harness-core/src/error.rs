//! Domain errors callers may want to tell apart.
//!
//! Storage failures travel as plain [`anyhow::Error`]. These variants are
//! wrapped in `anyhow` too, so callers match on them with
//! `err.downcast_ref::<IndexError>()`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Term-only updates require a page that was already added.
    #[error("cannot add terms for unknown page \"{0}\"")]
    UnknownPage(String),

    /// The input has no host component after normalization.
    #[error("not a page URL: \"{0}\"")]
    InvalidUrl(String),

    #[error("invalid URL pattern: {0}")]
    InvalidPattern(String),
}
