//! `pgh search` and `pgh suggest`.
//!
//! Builds a [`SearchQuery`] from CLI flags, runs it against the loaded
//! index and prints either a numbered listing or the raw result as JSON.

use anyhow::Result;
use serde::Serialize;

use page_harness_core::store::Store;
use page_harness_core::{PageIndex, SearchQuery, SearchResult, SuggestField};

use crate::config::Config;
use crate::db;

/// One listed hit, joined with the page's title for display.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub score: i64,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub has_bookmark: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub results_exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

/// Run a query and join each hit with its stored page.
pub async fn search_pages<S: Store>(
    index: &PageIndex<S>,
    query: &SearchQuery,
) -> Result<SearchResponse> {
    let SearchResult {
        docs,
        results_exhausted,
        total_count,
    } = index.search(query).await?;

    let mut results = Vec::with_capacity(docs.len());
    for (url, score) in docs {
        let (title, tags, has_bookmark) = match index.get_page(&url).await? {
            Some(view) => (view.title, view.tags, view.has_bookmark),
            None => (None, Vec::new(), false),
        };
        results.push(SearchHit {
            url,
            score,
            title,
            tags,
            has_bookmark,
        });
    }

    Ok(SearchResponse {
        results,
        results_exhausted,
        total_count,
    })
}

pub async fn run_search(config: &Config, query: SearchQuery, json: bool) -> Result<()> {
    let index = db::open_index(config).await?;
    let response = search_pages(&index, &query).await?;
    index.store().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let Some(total) = response.total_count {
        println!("Total: {}", total);
    }
    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let offset = query.skip.unwrap_or(0);
    for (i, hit) in response.results.iter().enumerate() {
        let title_display = hit.title.as_deref().unwrap_or("(untitled)");
        let marker = if hit.has_bookmark { " *" } else { "" };
        println!("{}. {}{}", offset + i + 1, title_display, marker);
        println!("    url: {}", hit.url);
        println!("    score: {}", hit.score);
        if !hit.tags.is_empty() {
            println!("    tags: {}", hit.tags.join(", "));
        }
        println!();
    }
    if !response.results_exhausted {
        println!("More results available (use --skip {}).", offset + response.results.len());
    }

    Ok(())
}

pub async fn run_suggest(config: &Config, prefix: &str, field: SuggestField) -> Result<()> {
    let index = db::open_index(config).await?;
    let suggestions = index.suggest(prefix, field);
    index.store().close().await;

    for value in suggestions {
        println!("{}", value);
    }
    Ok(())
}
