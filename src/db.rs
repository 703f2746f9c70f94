use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use page_harness_core::PageIndex;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::debug!(target: "page_harness::db", path = %db_path.display(), "opened pool");
    Ok(pool)
}

/// Connect and load the postings index from the page tables.
///
/// Fails if the schema has not been created by `pgh init`.
pub async fn open_index(config: &Config) -> Result<PageIndex<SqliteStore>> {
    let pool = connect(config).await?;
    PageIndex::open(SqliteStore::new(pool), config.search_params())
        .await
        .with_context(|| {
            format!(
                "Failed to load page index from {} (run `pgh init` first?)",
                config.db.path.display()
            )
        })
}
