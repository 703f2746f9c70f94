//! Page retrieval by URL.
//!
//! Prints the joined page view (metadata, visits, bookmark, tags) as
//! pretty JSON, or `Not found.` when no page is stored under the URL.

use anyhow::Result;

use crate::config::Config;
use crate::db;

/// CLI entry point for `pgh get`.
pub async fn run_get(config: &Config, url: &str) -> Result<()> {
    let index = db::open_index(config).await?;

    match index.get_page(url).await? {
        Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
        None => println!("Not found."),
    }

    index.store().close().await;
    Ok(())
}
