use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Pages table: term sets and keywords are JSON arrays
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            url TEXT PRIMARY KEY,
            full_url TEXT NOT NULL,
            domain TEXT NOT NULL,
            hostname TEXT NOT NULL,
            full_title TEXT,
            text TEXT,
            terms TEXT NOT NULL DEFAULT '[]',
            url_terms TEXT NOT NULL DEFAULT '[]',
            title_terms TEXT NOT NULL DEFAULT '[]',
            screenshot BLOB,
            lang TEXT,
            canonical_url TEXT,
            description TEXT,
            keywords TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS visits (
            url TEXT NOT NULL,
            time INTEGER NOT NULL,
            duration INTEGER,
            scroll_px REAL,
            scroll_perc REAL,
            scroll_max_px REAL,
            scroll_max_perc REAL,
            PRIMARY KEY (url, time)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookmarks (
            url TEXT PRIMARY KEY,
            time INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            url TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (url, name)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_hostname ON pages(hostname)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_name ON tags(name)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_time ON visits(time DESC)")
        .execute(&pool)
        .await?;

    tracing::info!(target: "page_harness::db", "migrations applied");
    pool.close().await;
    Ok(())
}
