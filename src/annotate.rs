//! Metadata commands: visits, bookmarks and tags.
//!
//! Visits, bookmarks and tags on a URL that was never added create a stub
//! page. Removing the last visit or the bookmark deletes the page.

use anyhow::Result;

use page_harness_core::models::{Timestamp, VisitInteraction};

use crate::config::Config;
use crate::db;

fn format_ms(ts: Timestamp) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn run_visit(
    config: &Config,
    url: &str,
    time: Option<Timestamp>,
    interaction: VisitInteraction,
) -> Result<()> {
    let index = db::open_index(config).await?;
    let time = index.add_visit(url, time, interaction).await?;
    println!("Visit recorded: {} at {}", url, format_ms(time));
    index.store().close().await;
    Ok(())
}

pub async fn run_unvisit(config: &Config, url: &str, time: Timestamp) -> Result<()> {
    let index = db::open_index(config).await?;
    if index.del_visit(url, time).await? {
        println!("Visit removed: {} at {}", url, format_ms(time));
    } else {
        println!("No visit at {} for {}", time, url);
    }
    index.store().close().await;
    Ok(())
}

pub async fn run_bookmark(config: &Config, url: &str, time: Option<Timestamp>) -> Result<()> {
    let index = db::open_index(config).await?;
    let time = index.add_bookmark(url, time).await?;
    println!("Bookmarked: {} at {}", url, format_ms(time));
    index.store().close().await;
    Ok(())
}

pub async fn run_unbookmark(config: &Config, url: &str) -> Result<()> {
    let index = db::open_index(config).await?;
    if index.del_bookmark(url).await? {
        println!("Bookmark removed: {}", url);
    } else {
        println!("Not bookmarked: {}", url);
    }
    index.store().close().await;
    Ok(())
}

pub async fn run_tag(config: &Config, url: &str, name: &str) -> Result<()> {
    let index = db::open_index(config).await?;
    if index.add_tag(url, name).await? {
        println!("Tagged: {} #{}", url, name.trim());
    } else {
        println!("Unchanged: {} #{}", url, name.trim());
    }
    index.store().close().await;
    Ok(())
}

pub async fn run_untag(config: &Config, url: &str, name: &str) -> Result<()> {
    let index = db::open_index(config).await?;
    if index.del_tag(url, name).await? {
        println!("Untagged: {} #{}", url, name.trim());
    } else {
        println!("Unchanged: {} #{}", url, name.trim());
    }
    index.store().close().await;
    Ok(())
}
