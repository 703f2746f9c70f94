//! Query evaluation with boosted-recency scoring.
//!
//! The evaluator resolves everything it can through the [`PostingsIndex`]
//! and only touches the [`Store`] to read the visit and bookmark times of
//! the pages that survive filtering.
//!
//! # Algorithm
//!
//! 1. Parse the free text ([`parse_query`]) and merge its domains and tags
//!    with the structured filters.
//! 2. Intersect, across positive terms, the union of body/title/URL
//!    postings for each term. No positive terms means every page.
//! 3. Subtract postings of negative terms.
//! 4. Intersect with the domain filter and the tag filter (OR within a
//!    filter, AND across filters); subtract excluded domains and tags.
//! 5. Pick each page's qualifying timestamp: its bookmark time in
//!    bookmark-only mode, otherwise its latest visit or bookmark inside
//!    `[start_date, end_date]`. Pages without one are dropped.
//! 6. `score = trunc(timestamp × boost)`, where boost is `title_boost`
//!    when a positive term hits the title index, else `url_boost` on a
//!    URL-index hit, else 1.0.
//! 7. Sort by score (desc), then URL (asc); apply `skip`/`limit`.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::{Postings, PostingsIndex, TermField, ValueField};
use crate::models::Timestamp;
use crate::query::parse_query;
use crate::store::Store;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Page size when a query gives no `limit`.
    pub default_limit: usize,
    /// Score multiplier for pages matched through the title index.
    pub title_boost: f64,
    /// Score multiplier for pages matched through the URL index.
    pub url_boost: f64,
    /// Maximum number of suggestions returned.
    pub suggest_limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            default_limit: 10,
            title_boost: 1.2,
            url_boost: 1.1,
            suggest_limit: 10,
        }
    }
}

/// A search request. Every field is optional; absent fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub domains: Vec<String>,
    pub domains_exclude: Vec<String>,
    pub tags: Vec<String>,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub show_only_bookmarks: bool,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub get_total_count: bool,
}

impl SearchQuery {
    pub fn text(query: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// `(url, score)` pairs, best first.
    pub docs: Vec<(String, i64)>,
    pub results_exhausted: bool,
    /// Only populated when `get_total_count` was requested.
    pub total_count: Option<usize>,
}

impl SearchResult {
    fn empty(get_total_count: bool) -> Self {
        Self {
            docs: Vec::new(),
            results_exhausted: true,
            total_count: get_total_count.then_some(0),
        }
    }

    pub fn urls(&self) -> Vec<&str> {
        self.docs.iter().map(|(url, _)| url.as_str()).collect()
    }
}

fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    lowered
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(lowered)
}

fn intersect(into: &mut Postings, with: &Postings) {
    into.retain(|url| with.contains(url));
}

fn subtract(from: &mut Postings, remove: &Postings) {
    from.retain(|url| !remove.contains(url));
}

/// Run a search over `index`, reading event times from `store`.
pub async fn search<S: Store + ?Sized>(
    store: &S,
    index: &PostingsIndex,
    params: &SearchParams,
    req: &SearchQuery,
) -> Result<SearchResult> {
    let parsed = parse_query(req.query.as_deref().unwrap_or(""));
    if parsed.is_unsatisfiable() {
        debug!(target: "page_harness::search", "query has no searchable terms");
        return Ok(SearchResult::empty(req.get_total_count));
    }

    let terms: Vec<String> = parsed.terms.iter().cloned().collect();

    let mut candidates: Option<Postings> = None;
    for term in &terms {
        let postings = index.any_term_postings(term);
        match candidates.as_mut() {
            Some(c) => intersect(c, &postings),
            None => candidates = Some(postings),
        }
    }
    let mut candidates = candidates.unwrap_or_else(|| index.all_urls());

    for term in &parsed.exclude_terms {
        subtract(&mut candidates, &index.any_term_postings(term));
    }

    let domains: BTreeSet<String> = req
        .domains
        .iter()
        .map(|d| normalize_domain(d))
        .chain(parsed.domains.iter().cloned())
        .filter(|d| !d.is_empty())
        .collect();
    if !domains.is_empty() {
        let mut allowed = Postings::new();
        for domain in &domains {
            allowed.extend(index.domain_postings(domain));
        }
        intersect(&mut candidates, &allowed);
    }

    let tags: BTreeSet<&str> = req
        .tags
        .iter()
        .map(|t| t.trim())
        .chain(parsed.tags.iter().map(String::as_str))
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        let mut allowed = Postings::new();
        for tag in tags {
            allowed.extend(index.value_postings(tag, ValueField::Tag));
        }
        intersect(&mut candidates, &allowed);
    }

    let excluded_domains = req
        .domains_exclude
        .iter()
        .map(|d| normalize_domain(d))
        .chain(parsed.exclude_domains.iter().cloned());
    for domain in excluded_domains {
        subtract(&mut candidates, &index.domain_postings(&domain));
    }
    for tag in &parsed.exclude_tags {
        subtract(&mut candidates, &index.value_postings(tag, ValueField::Tag));
    }

    let start = req.start_date.unwrap_or(0);
    let end = req.end_date.unwrap_or(Timestamp::MAX);

    let mut scored: Vec<(String, i64)> = Vec::with_capacity(candidates.len());
    for url in candidates {
        let ts = match qualifying_timestamp(store, &url, start, end, req.show_only_bookmarks).await? {
            Some(ts) => ts,
            None => continue,
        };
        let boost = if terms.is_empty() {
            1.0
        } else if index.has_any_term(&url, &terms, TermField::Title) {
            params.title_boost
        } else if index.has_any_term(&url, &terms, TermField::Url) {
            params.url_boost
        } else {
            1.0
        };
        let score = (ts as f64 * boost) as i64;
        scored.push((url, score));
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total = scored.len();
    let skip = req.skip.unwrap_or(0);
    let limit = req.limit.unwrap_or(params.default_limit);
    let docs: Vec<(String, i64)> = scored.into_iter().skip(skip).take(limit).collect();

    debug!(
        target: "page_harness::search",
        terms = terms.len(),
        total,
        returned = docs.len(),
        skip,
        "search evaluated"
    );

    Ok(SearchResult {
        results_exhausted: skip.saturating_add(docs.len()) >= total,
        total_count: req.get_total_count.then_some(total),
        docs,
    })
}

async fn qualifying_timestamp<S: Store + ?Sized>(
    store: &S,
    url: &str,
    start: Timestamp,
    end: Timestamp,
    bookmarks_only: bool,
) -> Result<Option<Timestamp>> {
    let in_range = |t: Timestamp| t >= start && t <= end;
    let bookmark = store.bookmark_for(url).await?.map(|b| b.time);

    if bookmarks_only {
        return Ok(bookmark.filter(|t| in_range(*t)));
    }

    let latest_visit = store
        .visits_for(url)
        .await?
        .into_iter()
        .map(|v| v.time)
        .filter(|t| in_range(*t))
        .max();
    Ok(latest_visit.into_iter().chain(bookmark.filter(|t| in_range(*t))).max())
}
