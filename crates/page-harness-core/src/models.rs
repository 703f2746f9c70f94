//! Core data models.
//!
//! The persisted rows ([`PageRecord`], [`Visit`], [`Bookmark`], [`Tag`]) are
//! flat and serializable; each lives in its own table keyed by the page's
//! normalized URL. [`PageAggregate`] is the in-memory join of one page with
//! all of its rows, built on read and never stored as a unit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// A page row, keyed by normalized URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub full_url: String,
    /// Registrable domain, e.g. `lorem.com` for `sub.lorem.com`.
    pub domain: String,
    /// Full host without a leading `www.`.
    pub hostname: String,
    pub full_title: Option<String>,
    pub text: Option<String>,
    pub terms: BTreeSet<String>,
    pub url_terms: BTreeSet<String>,
    pub title_terms: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Vec<u8>>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl PageRecord {
    /// A placeholder page created by a metadata-only action.
    pub fn is_stub(&self) -> bool {
        self.text.is_none() && self.terms.is_empty()
    }

    /// Fold an existing stored row into this incoming one.
    ///
    /// Term sets union; the screenshot and optional metadata carry over
    /// when the incoming write does not supply them.
    pub fn merge_existing(&mut self, existing: &PageRecord) {
        self.terms.extend(existing.terms.iter().cloned());
        self.url_terms.extend(existing.url_terms.iter().cloned());
        self.title_terms.extend(existing.title_terms.iter().cloned());

        if self.screenshot.is_none() {
            self.screenshot = existing.screenshot.clone();
        }
        if self.text.is_none() {
            self.text = existing.text.clone();
        }
        if self.full_title.is_none() {
            self.full_title = existing.full_title.clone();
        }
        if self.lang.is_none() {
            self.lang = existing.lang.clone();
        }
        if self.canonical_url.is_none() {
            self.canonical_url = existing.canonical_url.clone();
        }
        if self.description.is_none() {
            self.description = existing.description.clone();
        }
        if self.keywords.is_empty() {
            self.keywords = existing.keywords.clone();
        }
    }
}

/// Optional engagement metrics recorded with a visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitInteraction {
    pub duration: Option<i64>,
    pub scroll_px: Option<f64>,
    pub scroll_perc: Option<f64>,
    pub scroll_max_px: Option<f64>,
    pub scroll_max_perc: Option<f64>,
}

/// One viewing event, keyed by `(url, time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub url: String,
    pub time: Timestamp,
    #[serde(flatten)]
    pub interaction: VisitInteraction,
}

/// At most one per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    pub time: Timestamp,
}

/// Keyed by `(url, name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub url: String,
    pub name: String,
}

/// Shared shape of the timestamped rows that keep a page alive.
pub trait PageEvent {
    fn url(&self) -> &str;
    fn time(&self) -> Timestamp;
}

impl PageEvent for Visit {
    fn url(&self) -> &str {
        &self.url
    }

    fn time(&self) -> Timestamp {
        self.time
    }
}

impl PageEvent for Bookmark {
    fn url(&self) -> &str {
        &self.url
    }

    fn time(&self) -> Timestamp {
        self.time
    }
}

/// Content of a page as captured by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Raw page document before normalization and tokenization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDoc {
    pub url: String,
    #[serde(default)]
    pub content: PageContent,
    #[serde(default)]
    pub screenshot: Option<Vec<u8>>,
}

/// Input to [`PageIndex::add_page`](crate::pages::PageIndex::add_page).
#[derive(Debug, Clone, Default)]
pub struct AddPageRequest {
    pub page_doc: PageDoc,
    pub visits: Vec<Timestamp>,
    pub bookmark: Option<Timestamp>,
}

/// A page joined with its visits, bookmark and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAggregate {
    pub page: PageRecord,
    /// Sorted by time; times are unique.
    pub visits: Vec<Visit>,
    pub bookmark: Option<Bookmark>,
    pub tags: BTreeSet<String>,
}

impl PageAggregate {
    pub fn new(page: PageRecord) -> Self {
        Self {
            page,
            visits: Vec::new(),
            bookmark: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.page.url
    }

    pub fn has_bookmark(&self) -> bool {
        self.bookmark.is_some()
    }

    /// No visit and no bookmark keep this page alive any more.
    pub fn should_delete(&self) -> bool {
        self.bookmark.is_none() && self.visits.is_empty()
    }

    /// Insert a visit, replacing the interaction data of an existing visit
    /// at the same time.
    pub fn add_visit(&mut self, time: Timestamp, interaction: VisitInteraction) {
        match self.visits.binary_search_by_key(&time, |v| v.time) {
            Ok(pos) => self.visits[pos].interaction = interaction,
            Err(pos) => self.visits.insert(
                pos,
                Visit {
                    url: self.page.url.clone(),
                    time,
                    interaction,
                },
            ),
        }
    }

    /// Insert a visit with no interaction data unless one already exists
    /// at `time`. Returns `true` if a row was added.
    pub fn ensure_visit(&mut self, time: Timestamp) -> bool {
        match self.visits.binary_search_by_key(&time, |v| v.time) {
            Ok(_) => false,
            Err(pos) => {
                self.visits.insert(
                    pos,
                    Visit {
                        url: self.page.url.clone(),
                        time,
                        interaction: VisitInteraction::default(),
                    },
                );
                true
            }
        }
    }

    /// Returns `true` if a visit at `time` existed.
    pub fn remove_visit(&mut self, time: Timestamp) -> bool {
        match self.visits.binary_search_by_key(&time, |v| v.time) {
            Ok(pos) => {
                self.visits.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_bookmark(&mut self, time: Timestamp) {
        self.bookmark = Some(Bookmark {
            url: self.page.url.clone(),
            time,
        });
    }

    pub fn del_bookmark(&mut self) -> bool {
        self.bookmark.take().is_some()
    }

    /// Returns `false` if the tag was already attached.
    pub fn add_tag(&mut self, name: &str) -> bool {
        self.tags.insert(name.to_string())
    }

    /// Returns `false` if the tag was not attached.
    pub fn del_tag(&mut self, name: &str) -> bool {
        self.tags.remove(name)
    }

    /// Latest visit or bookmark time at or below `upper_bound`, else 0.
    pub fn latest(&self, upper_bound: Option<Timestamp>) -> Timestamp {
        self.latest_in(0, upper_bound.unwrap_or(Timestamp::MAX))
            .unwrap_or(0)
    }

    /// Latest visit or bookmark time inside `[start, end]`.
    pub fn latest_in(&self, start: Timestamp, end: Timestamp) -> Option<Timestamp> {
        let visit_times = self.visits.iter().map(PageEvent::time);
        let bookmark_time = self.bookmark.iter().map(PageEvent::time);
        visit_times
            .chain(bookmark_time)
            .filter(|t| *t >= start && *t <= end)
            .max()
    }
}

/// Read view of a page returned by `get_page`.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub url: String,
    pub full_url: String,
    pub domain: String,
    pub hostname: String,
    pub title: Option<String>,
    pub has_bookmark: bool,
    pub bookmark_time: Option<Timestamp>,
    pub tags: Vec<String>,
    pub latest: Timestamp,
    pub visits: Vec<Visit>,
    pub is_stub: bool,
    pub lang: Option<String>,
    pub canonical_url: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub has_screenshot: bool,
}

impl From<&PageAggregate> for PageView {
    fn from(agg: &PageAggregate) -> Self {
        Self {
            url: agg.page.url.clone(),
            full_url: agg.page.full_url.clone(),
            domain: agg.page.domain.clone(),
            hostname: agg.page.hostname.clone(),
            title: agg.page.full_title.clone(),
            has_bookmark: agg.has_bookmark(),
            bookmark_time: agg.bookmark.as_ref().map(|b| b.time),
            tags: agg.tags.iter().cloned().collect(),
            latest: agg.latest(None),
            visits: agg.visits.clone(),
            is_stub: agg.page.is_stub(),
            lang: agg.page.lang.clone(),
            canonical_url: agg.page.canonical_url.clone(),
            description: agg.page.description.clone(),
            keywords: agg.page.keywords.clone(),
            has_screenshot: agg.page.screenshot.is_some(),
        }
    }
}
