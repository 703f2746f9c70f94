//! SQLite-backed [`Store`] implementation.
//!
//! Each table of the page model maps to one SQLite table (see
//! [`migrate`](crate::migrate)). Term sets and keyword lists are stored as
//! JSON arrays. [`Store::apply`] runs a whole [`WriteBatch`] inside one
//! transaction; any failing statement rolls the batch back.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use page_harness_core::models::{Bookmark, PageRecord, Tag, Visit, VisitInteraction};
use page_harness_core::store::{Mutation, Store, TableCounts, WriteBatch};

const PAGE_COLUMNS: &str = "url, full_url, domain, hostname, full_title, text, terms, \
     url_terms, title_terms, screenshot, lang, canonical_url, description, keywords";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }
}

fn json_set(raw: &str) -> Result<BTreeSet<String>> {
    serde_json::from_str(raw).with_context(|| format!("corrupt term set: {}", raw))
}

fn page_from_row(row: &SqliteRow) -> Result<PageRecord> {
    let terms: String = row.get("terms");
    let url_terms: String = row.get("url_terms");
    let title_terms: String = row.get("title_terms");
    let keywords: String = row.get("keywords");

    Ok(PageRecord {
        url: row.get("url"),
        full_url: row.get("full_url"),
        domain: row.get("domain"),
        hostname: row.get("hostname"),
        full_title: row.get("full_title"),
        text: row.get("text"),
        terms: json_set(&terms)?,
        url_terms: json_set(&url_terms)?,
        title_terms: json_set(&title_terms)?,
        screenshot: row.get("screenshot"),
        lang: row.get("lang"),
        canonical_url: row.get("canonical_url"),
        description: row.get("description"),
        keywords: serde_json::from_str(&keywords)
            .with_context(|| format!("corrupt keyword list: {}", keywords))?,
    })
}

fn visit_from_row(row: &SqliteRow) -> Visit {
    Visit {
        url: row.get("url"),
        time: row.get("time"),
        interaction: VisitInteraction {
            duration: row.get("duration"),
            scroll_px: row.get("scroll_px"),
            scroll_perc: row.get("scroll_perc"),
            scroll_max_px: row.get("scroll_max_px"),
            scroll_max_perc: row.get("scroll_max_perc"),
        },
    }
}

async fn apply_mutation(conn: &mut SqliteConnection, mutation: &Mutation) -> Result<()> {
    match mutation {
        Mutation::PutPage(page) => {
            sqlx::query(
                r#"
                INSERT INTO pages (url, full_url, domain, hostname, full_title, text,
                                   terms, url_terms, title_terms, screenshot, lang,
                                   canonical_url, description, keywords)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(url) DO UPDATE SET
                    full_url = excluded.full_url,
                    domain = excluded.domain,
                    hostname = excluded.hostname,
                    full_title = excluded.full_title,
                    text = excluded.text,
                    terms = excluded.terms,
                    url_terms = excluded.url_terms,
                    title_terms = excluded.title_terms,
                    screenshot = excluded.screenshot,
                    lang = excluded.lang,
                    canonical_url = excluded.canonical_url,
                    description = excluded.description,
                    keywords = excluded.keywords
                "#,
            )
            .bind(&page.url)
            .bind(&page.full_url)
            .bind(&page.domain)
            .bind(&page.hostname)
            .bind(&page.full_title)
            .bind(&page.text)
            .bind(serde_json::to_string(&page.terms)?)
            .bind(serde_json::to_string(&page.url_terms)?)
            .bind(serde_json::to_string(&page.title_terms)?)
            .bind(&page.screenshot)
            .bind(&page.lang)
            .bind(&page.canonical_url)
            .bind(&page.description)
            .bind(serde_json::to_string(&page.keywords)?)
            .execute(&mut *conn)
            .await?;
        }
        Mutation::DeletePage { url } => {
            sqlx::query("DELETE FROM pages WHERE url = ?")
                .bind(url)
                .execute(&mut *conn)
                .await?;
        }
        Mutation::PutVisit(visit) => {
            sqlx::query(
                r#"
                INSERT INTO visits (url, time, duration, scroll_px, scroll_perc,
                                    scroll_max_px, scroll_max_perc)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(url, time) DO UPDATE SET
                    duration = excluded.duration,
                    scroll_px = excluded.scroll_px,
                    scroll_perc = excluded.scroll_perc,
                    scroll_max_px = excluded.scroll_max_px,
                    scroll_max_perc = excluded.scroll_max_perc
                "#,
            )
            .bind(&visit.url)
            .bind(visit.time)
            .bind(visit.interaction.duration)
            .bind(visit.interaction.scroll_px)
            .bind(visit.interaction.scroll_perc)
            .bind(visit.interaction.scroll_max_px)
            .bind(visit.interaction.scroll_max_perc)
            .execute(&mut *conn)
            .await?;
        }
        Mutation::DeleteVisit { url, time } => {
            sqlx::query("DELETE FROM visits WHERE url = ? AND time = ?")
                .bind(url)
                .bind(*time)
                .execute(&mut *conn)
                .await?;
        }
        Mutation::PutBookmark(bookmark) => {
            sqlx::query(
                r#"
                INSERT INTO bookmarks (url, time) VALUES (?, ?)
                ON CONFLICT(url) DO UPDATE SET time = excluded.time
                "#,
            )
            .bind(&bookmark.url)
            .bind(bookmark.time)
            .execute(&mut *conn)
            .await?;
        }
        Mutation::DeleteBookmark { url } => {
            sqlx::query("DELETE FROM bookmarks WHERE url = ?")
                .bind(url)
                .execute(&mut *conn)
                .await?;
        }
        Mutation::PutTag(tag) => {
            sqlx::query("INSERT OR IGNORE INTO tags (url, name) VALUES (?, ?)")
                .bind(&tag.url)
                .bind(&tag.name)
                .execute(&mut *conn)
                .await?;
        }
        Mutation::DeleteTag { url, name } => {
            sqlx::query("DELETE FROM tags WHERE url = ? AND name = ?")
                .bind(url)
                .bind(name)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_page(&self, url: &str) -> Result<Option<PageRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM pages WHERE url = ?", PAGE_COLUMNS))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(page_from_row).transpose()
    }

    async fn visits_for(&self, url: &str) -> Result<Vec<Visit>> {
        let rows = sqlx::query(
            r#"
            SELECT url, time, duration, scroll_px, scroll_perc, scroll_max_px, scroll_max_perc
            FROM visits
            WHERE url = ?
            ORDER BY time ASC
            "#,
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(visit_from_row).collect())
    }

    async fn bookmark_for(&self, url: &str) -> Result<Option<Bookmark>> {
        let row = sqlx::query("SELECT url, time FROM bookmarks WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Bookmark {
            url: r.get("url"),
            time: r.get("time"),
        }))
    }

    async fn tags_for(&self, url: &str) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT url, name FROM tags WHERE url = ? ORDER BY name ASC")
            .bind(url)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| Tag {
                url: r.get("url"),
                name: r.get("name"),
            })
            .collect())
    }

    async fn scan_pages(&self) -> Result<Vec<PageRecord>> {
        let rows = sqlx::query(&format!("SELECT {} FROM pages ORDER BY url ASC", PAGE_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(page_from_row).collect()
    }

    async fn scan_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT url, name FROM tags ORDER BY url ASC, name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| Tag {
                url: r.get("url"),
                name: r.get("name"),
            })
            .collect())
    }

    async fn apply(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Dropping `tx` on an early return rolls back.
        let mut tx = self.pool.begin().await?;
        for mutation in &batch.mutations {
            apply_mutation(&mut *tx, mutation).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            pages: self.count_rows("pages").await?,
            visits: self.count_rows("visits").await?,
            bookmarks: self.count_rows("bookmarks").await?,
            tags: self.count_rows("tags").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, LoggingConfig, RetrievalConfig};
    use crate::{db, migrate};

    async fn open(dir: &tempfile::TempDir) -> SqliteStore {
        let config = Config {
            db: DbConfig {
                path: dir.path().join("data").join("pages.sqlite"),
            },
            retrieval: RetrievalConfig::default(),
            logging: LoggingConfig::default(),
        };
        migrate::run_migrations(&config).await.unwrap();
        SqliteStore::new(db::connect(&config).await.unwrap())
    }

    fn page(url: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            full_url: format!("https://{}", url),
            domain: "lorem.com".to_string(),
            hostname: "lorem.com".to_string(),
            full_title: Some("Lorem".to_string()),
            text: Some("lorem ipsum".to_string()),
            terms: ["ipsum", "lorem"].iter().map(|s| s.to_string()).collect(),
            url_terms: BTreeSet::new(),
            title_terms: ["lorem"].iter().map(|s| s.to_string()).collect(),
            screenshot: Some(vec![1, 2, 3]),
            lang: Some("en".to_string()),
            canonical_url: None,
            description: None,
            keywords: vec!["k".to_string()],
        }
    }

    fn visit(url: &str, time: i64) -> Visit {
        Visit {
            url: url.to_string(),
            time,
            interaction: VisitInteraction {
                duration: Some(5),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_rows_round_trip_through_sqlite() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = open(&dir).await;

        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutPage(page("lorem.com/a")));
        batch.push(Mutation::PutVisit(visit("lorem.com/a", 20)));
        batch.push(Mutation::PutVisit(visit("lorem.com/a", 10)));
        batch.push(Mutation::PutBookmark(Bookmark {
            url: "lorem.com/a".to_string(),
            time: 15,
        }));
        batch.push(Mutation::PutTag(Tag {
            url: "lorem.com/a".to_string(),
            name: "good".to_string(),
        }));
        store.apply(&batch).await.unwrap();

        assert_eq!(store.get_page("lorem.com/a").await.unwrap(), Some(page("lorem.com/a")));
        let times: Vec<i64> = store
            .visits_for("lorem.com/a")
            .await
            .unwrap()
            .iter()
            .map(|v| v.time)
            .collect();
        assert_eq!(times, vec![10, 20]);
        assert_eq!(store.bookmark_for("lorem.com/a").await.unwrap().unwrap().time, 15);
        assert_eq!(store.tags_for("lorem.com/a").await.unwrap().len(), 1);

        let counts = store.counts().await.unwrap();
        assert_eq!(
            counts,
            TableCounts {
                pages: 1,
                visits: 2,
                bookmarks: 1,
                tags: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = open(&dir).await;

        sqlx::query("DROP TABLE tags")
            .execute(store.pool())
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutPage(page("lorem.com/a")));
        batch.push(Mutation::PutTag(Tag {
            url: "lorem.com/a".to_string(),
            name: "good".to_string(),
        }));
        assert!(store.apply(&batch).await.is_err());

        assert!(store.get_page("lorem.com/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deletes_remove_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = open(&dir).await;

        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutPage(page("lorem.com/a")));
        batch.push(Mutation::PutVisit(visit("lorem.com/a", 10)));
        store.apply(&batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.push(Mutation::DeleteVisit {
            url: "lorem.com/a".to_string(),
            time: 10,
        });
        batch.push(Mutation::DeletePage {
            url: "lorem.com/a".to_string(),
        });
        store.apply(&batch).await.unwrap();

        assert_eq!(store.counts().await.unwrap(), TableCounts::default());
        assert!(store.scan_pages().await.unwrap().is_empty());
    }
}
