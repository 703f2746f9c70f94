//! Page ingestion: single adds, term-only updates, and JSONL bulk import.
//!
//! Every path ends in [`PageIndex::add_page`] or
//! [`PageIndex::add_page_terms`]; this module only turns CLI input and
//! import lines into [`AddPageRequest`]s.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use page_harness_core::models::{AddPageRequest, PageContent, PageDoc, Timestamp};
use page_harness_core::store::Store;
use page_harness_core::PageIndex;

use crate::config::Config;
use crate::db;

/// One line of a `pgh import` file.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRecord {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub visits: Vec<Timestamp>,
    #[serde(default)]
    pub bookmark: Option<Timestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ImportRecord {
    fn into_request(self) -> (AddPageRequest, Vec<String>) {
        let req = AddPageRequest {
            page_doc: page_doc(self.url, self.title, self.text),
            visits: self.visits,
            bookmark: self.bookmark,
        };
        (req, self.tags)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

fn page_doc(url: String, title: Option<String>, text: Option<String>) -> PageDoc {
    PageDoc {
        url,
        content: PageContent {
            title,
            full_text: text,
            ..Default::default()
        },
        screenshot: None,
    }
}

fn read_text(text: Option<String>, text_file: Option<&Path>) -> Result<Option<String>> {
    match text_file {
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read text file: {}", path.display())),
        None => Ok(text),
    }
}

pub async fn run_add(
    config: &Config,
    url: &str,
    title: Option<String>,
    text: Option<String>,
    text_file: Option<&Path>,
    visits: Vec<Timestamp>,
    bookmark: Option<Timestamp>,
) -> Result<()> {
    let text = read_text(text, text_file)?;
    let index = db::open_index(config).await?;

    let req = AddPageRequest {
        page_doc: page_doc(url.to_string(), title, text),
        visits,
        bookmark,
    };
    let key = index.add_page(req).await?;
    println!("Added: {}", key);

    index.store().close().await;
    Ok(())
}

pub async fn run_add_terms(
    config: &Config,
    url: &str,
    text: Option<String>,
    text_file: Option<&Path>,
) -> Result<()> {
    let text = read_text(text, text_file)?;
    let index = db::open_index(config).await?;

    index
        .add_page_terms(&page_doc(url.to_string(), None, text))
        .await?;
    println!("Updated terms: {}", url);

    index.store().close().await;
    Ok(())
}

/// Add one page per JSON line. Blank lines are ignored; lines that fail
/// to parse or to write are logged and counted as skipped.
pub async fn import_lines<S: Store, R: BufRead>(
    index: &PageIndex<S>,
    reader: R,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = i + 1;

        let record: ImportRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(target: "page_harness::write", line = line_no, error = %e, "skipping malformed line");
                summary.skipped += 1;
                continue;
            }
        };

        let (req, tags) = record.into_request();
        let url = match index.add_page(req).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(target: "page_harness::write", line = line_no, error = %e, "skipping page");
                summary.skipped += 1;
                continue;
            }
        };
        for tag in &tags {
            index.add_tag(&url, tag).await?;
        }
        summary.imported += 1;
    }

    Ok(summary)
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;
    let index = db::open_index(config).await?;

    let summary = import_lines(&index, std::io::BufReader::new(file)).await?;
    println!(
        "Imported {} pages ({} skipped) from {}",
        summary.imported,
        summary.skipped,
        path.display()
    );

    index.store().close().await;
    Ok(())
}
