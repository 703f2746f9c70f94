//! Page deletion by URL list, domain, or URL pattern.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;

/// What `pgh delete` should remove. Exactly one selector is used.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    Urls(Vec<String>),
    Domain(String),
    Pattern(String),
}

impl DeleteTarget {
    pub fn from_args(
        urls: Vec<String>,
        domain: Option<String>,
        pattern: Option<String>,
    ) -> Result<Self> {
        match (urls.is_empty(), domain, pattern) {
            (false, None, None) => Ok(Self::Urls(urls)),
            (true, Some(domain), None) => Ok(Self::Domain(domain)),
            (true, None, Some(pattern)) => Ok(Self::Pattern(pattern)),
            (true, None, None) => bail!("Nothing to delete: pass URLs, --domain, or --pattern"),
            _ => bail!("Pass only one of: URLs, --domain, --pattern"),
        }
    }
}

pub async fn run_delete(config: &Config, target: DeleteTarget) -> Result<()> {
    let index = db::open_index(config).await?;

    let deleted = match &target {
        DeleteTarget::Urls(urls) => index.del_pages(urls.as_slice()).await?,
        DeleteTarget::Domain(domain) => index.del_pages_by_domain(domain).await?,
        DeleteTarget::Pattern(pattern) => index.del_pages_by_pattern(pattern).await?,
    };
    println!("Deleted {} page(s).", deleted);

    index.store().close().await;
    Ok(())
}
