//! In-memory [`Store`] implementation for tests and embedded use.
//!
//! All four tables sit behind one `parking_lot::RwLock`, so a batch is
//! applied under a single write guard and readers never observe half of
//! it.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::models::{Bookmark, PageRecord, Tag, Timestamp, Visit};

use super::{Mutation, Store, TableCounts, WriteBatch};

#[derive(Default)]
struct Tables {
    pages: BTreeMap<String, PageRecord>,
    visits: BTreeMap<(String, Timestamp), Visit>,
    bookmarks: BTreeMap<String, Bookmark>,
    tags: BTreeMap<(String, String), Tag>,
}

impl Tables {
    fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::PutPage(page) => {
                self.pages.insert(page.url.clone(), page.clone());
            }
            Mutation::DeletePage { url } => {
                self.pages.remove(url);
            }
            Mutation::PutVisit(visit) => {
                self.visits
                    .insert((visit.url.clone(), visit.time), visit.clone());
            }
            Mutation::DeleteVisit { url, time } => {
                self.visits.remove(&(url.clone(), *time));
            }
            Mutation::PutBookmark(bookmark) => {
                self.bookmarks.insert(bookmark.url.clone(), bookmark.clone());
            }
            Mutation::DeleteBookmark { url } => {
                self.bookmarks.remove(url);
            }
            Mutation::PutTag(tag) => {
                self.tags
                    .insert((tag.url.clone(), tag.name.clone()), tag.clone());
            }
            Mutation::DeleteTag { url, name } => {
                self.tags.remove(&(url.clone(), name.clone()));
            }
        }
    }
}

/// In-memory store for tests and embedded use.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_page(&self, url: &str) -> Result<Option<PageRecord>> {
        Ok(self.tables.read().pages.get(url).cloned())
    }

    async fn visits_for(&self, url: &str) -> Result<Vec<Visit>> {
        let tables = self.tables.read();
        let start = (url.to_string(), Timestamp::MIN);
        Ok(tables
            .visits
            .range(start..)
            .take_while(|((u, _), _)| u == url)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn bookmark_for(&self, url: &str) -> Result<Option<Bookmark>> {
        Ok(self.tables.read().bookmarks.get(url).cloned())
    }

    async fn tags_for(&self, url: &str) -> Result<Vec<Tag>> {
        let tables = self.tables.read();
        let start = (url.to_string(), String::new());
        Ok(tables
            .tags
            .range(start..)
            .take_while(|((u, _), _)| u == url)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn scan_pages(&self) -> Result<Vec<PageRecord>> {
        Ok(self.tables.read().pages.values().cloned().collect())
    }

    async fn scan_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.tables.read().tags.values().cloned().collect())
    }

    async fn apply(&self, batch: &WriteBatch) -> Result<()> {
        let mut tables = self.tables.write();
        for mutation in &batch.mutations {
            tables.apply(mutation);
        }
        Ok(())
    }

    async fn counts(&self) -> Result<TableCounts> {
        let tables = self.tables.read();
        Ok(TableCounts {
            pages: tables.pages.len() as u64,
            visits: tables.visits.len() as u64,
            bookmarks: tables.bookmarks.len() as u64,
            tags: tables.tags.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitInteraction;

    fn visit(url: &str, time: Timestamp) -> Visit {
        Visit {
            url: url.to_string(),
            time,
            interaction: VisitInteraction::default(),
        }
    }

    fn tag(url: &str, name: &str) -> Tag {
        Tag {
            url: url.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_range_reads_are_scoped_to_url() {
        let store = InMemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutVisit(visit("a.com/x", 2)));
        batch.push(Mutation::PutVisit(visit("a.com/x", 1)));
        batch.push(Mutation::PutVisit(visit("a.com/xy", 3)));
        batch.push(Mutation::PutVisit(visit("a.com", 4)));
        batch.push(Mutation::PutTag(tag("a.com/x", "b")));
        batch.push(Mutation::PutTag(tag("a.com/xy", "a")));
        store.apply(&batch).await.unwrap();

        let times: Vec<i64> = store
            .visits_for("a.com/x")
            .await
            .unwrap()
            .iter()
            .map(|v| v.time)
            .collect();
        assert_eq!(times, vec![1, 2]);

        let tags = store.tags_for("a.com/x").await.unwrap();
        assert_eq!(tags, vec![tag("a.com/x", "b")]);
    }

    #[tokio::test]
    async fn test_deletes_and_counts() {
        let store = InMemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutVisit(visit("a.com/x", 1)));
        batch.push(Mutation::PutBookmark(Bookmark {
            url: "a.com/x".to_string(),
            time: 5,
        }));
        batch.push(Mutation::PutTag(tag("a.com/x", "t")));
        store.apply(&batch).await.unwrap();
        assert_eq!(
            store.counts().await.unwrap(),
            TableCounts {
                pages: 0,
                visits: 1,
                bookmarks: 1,
                tags: 1
            }
        );

        let mut batch = WriteBatch::new();
        batch.push(Mutation::DeleteVisit {
            url: "a.com/x".to_string(),
            time: 1,
        });
        batch.push(Mutation::DeleteBookmark {
            url: "a.com/x".to_string(),
        });
        batch.push(Mutation::DeleteTag {
            url: "a.com/x".to_string(),
            name: "t".to_string(),
        });
        store.apply(&batch).await.unwrap();
        assert_eq!(store.counts().await.unwrap(), TableCounts::default());
    }
}
