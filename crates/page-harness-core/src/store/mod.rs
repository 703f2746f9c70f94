//! Storage abstraction for Page Harness.
//!
//! The [`Store`] trait is the table-store capability the page index runs
//! on: point reads per table, a full page scan, and one atomic
//! multi-table write ([`Store::apply`]). Implementations own persistence
//! only; term merging, reconciliation and cascade rules live above them
//! in [`PageIndex`](crate::pages::PageIndex).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Bookmark, PageAggregate, PageRecord, Tag, Timestamp, Visit};

/// One row-level change inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutPage(PageRecord),
    DeletePage { url: String },
    PutVisit(Visit),
    DeleteVisit { url: String, time: Timestamp },
    PutBookmark(Bookmark),
    DeleteBookmark { url: String },
    PutTag(Tag),
    DeleteTag { url: String, name: String },
}

/// An ordered set of mutations that commits entirely or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub pages: u64,
    pub visits: u64,
    pub bookmarks: u64,
    pub tags: u64,
}

/// Abstract table store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_page`](Store::get_page) | Page row by normalized URL |
/// | [`visits_for`](Store::visits_for) | Visits of a page, ascending by time |
/// | [`bookmark_for`](Store::bookmark_for) | Bookmark of a page |
/// | [`tags_for`](Store::tags_for) | Tags of a page |
/// | [`scan_pages`](Store::scan_pages) | Every page row (index rebuilds) |
/// | [`scan_tags`](Store::scan_tags) | Every tag row (index rebuilds) |
/// | [`apply`](Store::apply) | Atomic multi-table write |
/// | [`counts`](Store::counts) | Row counts |
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_page(&self, url: &str) -> Result<Option<PageRecord>>;

    async fn visits_for(&self, url: &str) -> Result<Vec<Visit>>;

    async fn bookmark_for(&self, url: &str) -> Result<Option<Bookmark>>;

    async fn tags_for(&self, url: &str) -> Result<Vec<Tag>>;

    async fn scan_pages(&self) -> Result<Vec<PageRecord>>;

    async fn scan_tags(&self) -> Result<Vec<Tag>>;

    /// Apply every mutation in order inside one transaction.
    ///
    /// On error, none of the batch is visible to later reads.
    async fn apply(&self, batch: &WriteBatch) -> Result<()>;

    async fn counts(&self) -> Result<TableCounts>;
}

/// Join a page row with its visits, bookmark and tags.
///
/// Returns `None` when no page row exists for `url`.
pub async fn load_aggregate<S: Store + ?Sized>(
    store: &S,
    url: &str,
) -> Result<Option<PageAggregate>> {
    let page = match store.get_page(url).await? {
        Some(page) => page,
        None => return Ok(None),
    };

    let mut visits = store.visits_for(url).await?;
    visits.sort_by_key(|v| v.time);
    visits.dedup_by_key(|v| v.time);

    let bookmark = store.bookmark_for(url).await?;
    let tags = store
        .tags_for(url)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();

    Ok(Some(PageAggregate {
        page,
        visits,
        bookmark,
        tags,
    }))
}
