//! Database statistics and index health.
//!
//! `pgh stats` summarizes table row counts and postings sizes;
//! `pgh check` rebuilds the postings from the tables and reports whether
//! the live index agreed with them.

use anyhow::{bail, Result};

use page_harness_core::pages::IndexSummary;

use crate::config::Config;
use crate::db;

/// Run the stats command: load the index and print a summary.
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let index = db::open_index(config).await?;
    let summary = index.stats().await?;
    index.store().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    print_summary(config, db_size, &summary);
    Ok(())
}

fn print_summary(config: &Config, db_size: u64, summary: &IndexSummary) {
    let t = &summary.tables;
    let i = &summary.index;

    println!("Page Harness Database Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Pages:       {}", t.pages);
    println!("  Visits:      {}", t.visits);
    println!("  Bookmarks:   {}", t.bookmarks);
    println!("  Tags:        {}", t.tags);
    println!();
    println!("  Index:");
    println!("    Documents:    {}", i.documents);
    println!("    Body terms:   {}", i.body_terms);
    println!("    Title terms:  {}", i.title_terms);
    println!("    URL terms:    {}", i.url_terms);
    println!("    Domains:      {}", i.domains);
    println!("    Hostnames:    {}", i.hostnames);
    println!("    Tag names:    {}", i.tags);
    println!();
}

/// Run the check command. Exits non-zero when the index diverged.
pub async fn run_check(config: &Config) -> Result<()> {
    let index = db::open_index(config).await?;
    let consistent = index.verify_index().await?;
    index.store().close().await;

    if !consistent {
        bail!("index check failed: postings disagree with the page tables");
    }
    println!("Index OK.");
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
