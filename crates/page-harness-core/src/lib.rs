//! # Page Harness Core
//!
//! Storage-agnostic logic for Page Harness: the page/visit/bookmark/tag
//! data model, the store abstraction, the derived postings index, and the
//! query and suggestion engines that read it.
//!
//! This crate contains no sqlx, filesystem I/O, or async runtime. The only
//! tokio dependency is `tokio::sync`, which works without an executor.
//!
//! ## Data Flow
//!
//! ```text
//!  write path                          read path
//!  ──────────                          ─────────
//!  PageIndex::add_page ─┐              PageIndex::search ──┐
//!  add_visit / add_tag  ├─▶ reconcile  PageIndex::suggest  │
//!  del_pages …         ─┘      │                           ▼
//!                              ▼                    PostingsIndex
//!                     Store::apply(batch)                 │
//!                              │                          ▼
//!                              ▼                 Store (visit/bookmark
//!                      PostingsIndex::update      times for ranking)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Persisted rows (`PageRecord`, `Visit`, `Bookmark`, `Tag`) and the joined `PageAggregate` view |
//! | [`urls`] | URL normalization and domain/hostname extraction |
//! | [`tokenize`] | Text → deduplicated lowercase term set |
//! | [`store`] | `Store` trait, atomic `WriteBatch`, in-memory backend |
//! | [`index`] | Inverted term postings and domain/hostname/tag value postings |
//! | [`reconcile`] | Two-phase diff between stored rows and an updated aggregate |
//! | [`locks`] | Per-URL write serialization |
//! | [`pages`] | `PageIndex`: every write operation plus `get_page` |
//! | [`query`] | Free-text query parsing |
//! | [`search`] | Query evaluation, scoring and pagination |
//! | [`suggest`] | Prefix suggestions over domains and tags |

pub mod error;
pub mod index;
pub mod locks;
pub mod models;
pub mod pages;
pub mod query;
pub mod reconcile;
pub mod search;
pub mod store;
pub mod suggest;
pub mod tokenize;
pub mod urls;

pub use error::IndexError;
pub use pages::PageIndex;
pub use search::{SearchParams, SearchQuery, SearchResult};
pub use suggest::SuggestField;
