//! The page index facade.
//!
//! [`PageIndex`] owns a [`Store`], the derived [`PostingsIndex`] and the
//! per-URL write locks. Every mutating operation follows the same shape:
//!
//! 1. Normalize the URL and take its write lock.
//! 2. Load the stored [`PageAggregate`] (or start a new or stub page).
//! 3. Mutate a copy in memory.
//! 4. Diff stored vs. desired rows ([`reconcile::compute_diff`]) and apply
//!    the batch atomically.
//! 5. Only after the store commits, update the postings.
//!
//! A failed commit therefore leaves both the entity tables and the postings
//! exactly as they were. Commits hold the rebuild gate shared; a rebuild
//! holds it exclusively from the scan to the swap, so no commit lands in
//! between and gets overwritten.
//!
//! Operations that remove a visit or the bookmark delete the page, with all
//! of its rows, once neither remains.

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::IndexError;
use crate::index::{IndexStats, IndexedFields, PostingsIndex};
use crate::locks::UrlLocks;
use crate::models::{
    now_ms, AddPageRequest, PageAggregate, PageDoc, PageRecord, PageView, Timestamp,
    VisitInteraction,
};
use crate::reconcile::compute_diff;
use crate::search::{self, SearchParams, SearchQuery, SearchResult};
use crate::store::{load_aggregate, Store, TableCounts};
use crate::suggest::{self, SuggestField};
use crate::tokenize::{tokenize, tokenize_opt};
use crate::urls::{normalize_url, NormalizedUrl};

/// Row counts plus postings statistics.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub tables: TableCounts,
    pub index: IndexStats,
}

fn stub_page(n: &NormalizedUrl) -> PageRecord {
    PageRecord {
        url: n.url.clone(),
        full_url: n.full_url.clone(),
        domain: n.domain.clone(),
        hostname: n.hostname.clone(),
        full_title: None,
        text: None,
        terms: Default::default(),
        url_terms: tokenize(n.path()),
        title_terms: Default::default(),
        screenshot: None,
        lang: None,
        canonical_url: None,
        description: None,
        keywords: Vec::new(),
    }
}

/// Normalize and tokenize a captured document into a page row.
pub fn build_page(doc: &PageDoc) -> Result<PageRecord, IndexError> {
    let n = normalize_url(&doc.url)?;
    let content = &doc.content;
    let mut page = stub_page(&n);
    page.full_title = content.title.clone();
    page.text = content.full_text.clone();
    page.terms = tokenize_opt(content.full_text.as_deref());
    page.title_terms = tokenize_opt(content.title.as_deref());
    page.screenshot = doc.screenshot.clone();
    page.lang = content.lang.clone();
    page.canonical_url = content.canonical_url.clone();
    page.description = content.description.clone();
    page.keywords = content.keywords.clone();
    Ok(page)
}

/// Entity store operations, search and suggestions over one [`Store`].
pub struct PageIndex<S: Store> {
    store: S,
    index: PostingsIndex,
    locks: UrlLocks,
    gate: RwLock<()>,
    params: SearchParams,
}

impl<S: Store> PageIndex<S> {
    /// Wrap `store`, building the postings from its current contents.
    pub async fn open(store: S, params: SearchParams) -> Result<Self> {
        let this = Self {
            store,
            index: PostingsIndex::new(),
            locks: UrlLocks::new(),
            gate: RwLock::new(()),
            params,
        };
        this.index.rebuild(&this.store).await?;
        Ok(this)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn postings(&self) -> &PostingsIndex {
        &self.index
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Diff, apply, then update postings. `desired = None` deletes the page.
    async fn commit(
        &self,
        url: &str,
        existing: Option<&PageAggregate>,
        desired: Option<&PageAggregate>,
    ) -> Result<()> {
        let diff = compute_diff(url, existing, desired);
        if diff.is_empty() {
            return Ok(());
        }
        let batch = diff.into_batch();
        let _shared = self.gate.read().await;
        self.store.apply(&batch).await?;
        self.index
            .update(url, desired.map(IndexedFields::from_aggregate));
        debug!(target: "page_harness::write", url, rows = batch.len(), "batch committed");
        Ok(())
    }

    /// Commit `agg`, or delete the page if nothing keeps it alive.
    async fn commit_or_cascade(&self, existing: &PageAggregate, agg: PageAggregate) -> Result<()> {
        if agg.should_delete() {
            self.commit(agg.url(), Some(existing), None).await?;
            self.locks.remove(agg.url());
            info!(target: "page_harness::write", url = agg.url(), "page deleted: no visits or bookmark left");
        } else {
            self.commit(agg.url(), Some(existing), Some(&agg)).await?;
        }
        Ok(())
    }

    /// Load the page for `n`, or start a stub so metadata writes always land.
    async fn load_or_stub(&self, n: &NormalizedUrl) -> Result<(Option<PageAggregate>, PageAggregate)> {
        let existing = load_aggregate(&self.store, &n.url).await?;
        let desired = match &existing {
            Some(agg) => agg.clone(),
            None => {
                debug!(target: "page_harness::write", url = %n.url, "creating stub page");
                PageAggregate::new(stub_page(n))
            }
        };
        Ok((existing, desired))
    }

    /// Add or re-add a page.
    ///
    /// Term sets union with the stored page's; the screenshot and metadata
    /// carry over when not supplied. Supplied visits and the bookmark are
    /// added to any already stored. Returns the normalized URL.
    pub async fn add_page(&self, req: AddPageRequest) -> Result<String> {
        let mut page = build_page(&req.page_doc)?;
        let url = page.url.clone();
        let _guard = self.locks.acquire(&url).await;

        let existing = load_aggregate(&self.store, &url).await?;
        let mut desired = match &existing {
            Some(stored) => {
                page.merge_existing(&stored.page);
                let mut agg = stored.clone();
                agg.page = page;
                agg
            }
            None => PageAggregate::new(page),
        };
        for time in req.visits {
            desired.ensure_visit(time);
        }
        if let Some(time) = req.bookmark {
            desired.set_bookmark(time);
        }

        self.commit(&url, existing.as_ref(), Some(&desired)).await?;
        debug!(
            target: "page_harness::write",
            url = %url,
            terms = desired.page.terms.len(),
            visits = desired.visits.len(),
            "page added"
        );
        Ok(url)
    }

    /// Merge body terms from `doc` into an existing page.
    ///
    /// Title, visits, bookmark and tags are untouched. Fails with
    /// [`IndexError::UnknownPage`] if the page was never added.
    pub async fn add_page_terms(&self, doc: &PageDoc) -> Result<()> {
        let n = normalize_url(&doc.url)?;
        let _guard = self.locks.acquire(&n.url).await;

        let existing = match load_aggregate(&self.store, &n.url).await? {
            Some(agg) => agg,
            None => {
                self.locks.remove(&n.url);
                return Err(IndexError::UnknownPage(n.url).into());
            }
        };
        let mut desired = existing.clone();
        desired
            .page
            .terms
            .extend(tokenize_opt(doc.content.full_text.as_deref()));

        self.commit(&n.url, Some(&existing), Some(&desired)).await
    }

    /// Record a visit at `time` (default now), replacing the interaction
    /// data of a visit already stored at that time.
    pub async fn add_visit(
        &self,
        url: &str,
        time: Option<Timestamp>,
        interaction: VisitInteraction,
    ) -> Result<Timestamp> {
        let n = normalize_url(url)?;
        let time = time.unwrap_or_else(now_ms);
        let _guard = self.locks.acquire(&n.url).await;

        let (existing, mut desired) = self.load_or_stub(&n).await?;
        desired.add_visit(time, interaction);
        self.commit(&n.url, existing.as_ref(), Some(&desired)).await?;
        Ok(time)
    }

    /// Update the interaction data of an existing visit.
    ///
    /// Returns `false`, changing nothing, if no such visit exists.
    pub async fn update_visit_interaction(
        &self,
        url: &str,
        time: Timestamp,
        interaction: VisitInteraction,
    ) -> Result<bool> {
        let n = normalize_url(url)?;
        let _guard = self.locks.acquire(&n.url).await;

        let existing = match load_aggregate(&self.store, &n.url).await? {
            Some(agg) => agg,
            None => {
                self.locks.remove(&n.url);
                return Ok(false);
            }
        };
        if !existing.visits.iter().any(|v| v.time == time) {
            return Ok(false);
        }
        let mut desired = existing.clone();
        desired.add_visit(time, interaction);
        self.commit(&n.url, Some(&existing), Some(&desired)).await?;
        Ok(true)
    }

    /// Remove one visit. Returns `false` if it did not exist.
    pub async fn del_visit(&self, url: &str, time: Timestamp) -> Result<bool> {
        let n = normalize_url(url)?;
        let _guard = self.locks.acquire(&n.url).await;

        let existing = match load_aggregate(&self.store, &n.url).await? {
            Some(agg) => agg,
            None => {
                self.locks.remove(&n.url);
                return Ok(false);
            }
        };
        let mut desired = existing.clone();
        if !desired.remove_visit(time) {
            return Ok(false);
        }
        self.commit_or_cascade(&existing, desired).await?;
        Ok(true)
    }

    /// Bookmark a page at `time` (default now), replacing any earlier
    /// bookmark time.
    pub async fn add_bookmark(&self, url: &str, time: Option<Timestamp>) -> Result<Timestamp> {
        let n = normalize_url(url)?;
        let time = time.unwrap_or_else(now_ms);
        let _guard = self.locks.acquire(&n.url).await;

        let (existing, mut desired) = self.load_or_stub(&n).await?;
        desired.set_bookmark(time);
        self.commit(&n.url, existing.as_ref(), Some(&desired)).await?;
        Ok(time)
    }

    /// Remove the bookmark. Returns `false` if the page had none.
    pub async fn del_bookmark(&self, url: &str) -> Result<bool> {
        let n = normalize_url(url)?;
        let _guard = self.locks.acquire(&n.url).await;

        let existing = match load_aggregate(&self.store, &n.url).await? {
            Some(agg) => agg,
            None => {
                self.locks.remove(&n.url);
                return Ok(false);
            }
        };
        let mut desired = existing.clone();
        if !desired.del_bookmark() {
            return Ok(false);
        }
        self.commit_or_cascade(&existing, desired).await?;
        Ok(true)
    }

    /// Attach a tag. Returns `false` if it was already attached.
    pub async fn add_tag(&self, url: &str, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        let n = normalize_url(url)?;
        let _guard = self.locks.acquire(&n.url).await;

        let (existing, mut desired) = self.load_or_stub(&n).await?;
        if !desired.add_tag(name) {
            return Ok(false);
        }
        self.commit(&n.url, existing.as_ref(), Some(&desired)).await?;
        Ok(true)
    }

    /// Detach a tag. Returns `false` if it was not attached.
    pub async fn del_tag(&self, url: &str, name: &str) -> Result<bool> {
        let n = normalize_url(url)?;
        let _guard = self.locks.acquire(&n.url).await;

        let existing = match load_aggregate(&self.store, &n.url).await? {
            Some(agg) => agg,
            None => {
                self.locks.remove(&n.url);
                return Ok(false);
            }
        };
        let mut desired = existing.clone();
        if !desired.del_tag(name.trim()) {
            return Ok(false);
        }
        self.commit(&n.url, Some(&existing), Some(&desired)).await?;
        Ok(true)
    }

    /// Delete one already-normalized URL with all of its rows.
    async fn delete_normalized(&self, url: &str) -> Result<bool> {
        let _guard = self.locks.acquire(url).await;
        let existing = match load_aggregate(&self.store, url).await? {
            Some(agg) => agg,
            None => {
                self.locks.remove(url);
                return Ok(false);
            }
        };
        self.commit(url, Some(&existing), None).await?;
        self.locks.remove(url);
        Ok(true)
    }

    /// Delete pages (and their visits, bookmark and tags). Returns how many
    /// existed.
    ///
    /// Every URL is normalized before anything is deleted; one invalid URL
    /// fails the call with no page removed.
    pub async fn del_pages<U: AsRef<str>>(&self, urls: &[U]) -> Result<usize> {
        let normalized = urls
            .iter()
            .map(|url| normalize_url(url.as_ref()).map(|n| n.url))
            .collect::<Result<Vec<_>, _>>()?;
        let mut deleted = 0;
        for url in normalized {
            if self.delete_normalized(&url).await? {
                deleted += 1;
            }
        }
        info!(target: "page_harness::write", deleted, "pages deleted");
        Ok(deleted)
    }

    /// Delete every page whose registrable domain or hostname is `domain`.
    pub async fn del_pages_by_domain(&self, domain: &str) -> Result<usize> {
        let domain = domain.trim().to_lowercase();
        let domain = domain.strip_prefix("www.").unwrap_or(&domain);
        let mut deleted = 0;
        for url in self.index.domain_postings(domain) {
            if self.delete_normalized(&url).await? {
                deleted += 1;
            }
        }
        info!(target: "page_harness::write", domain, deleted, "pages deleted by domain");
        Ok(deleted)
    }

    /// Delete every page whose normalized URL matches `pattern`.
    ///
    /// Fails with [`IndexError::InvalidPattern`] if `pattern` is not a
    /// valid regular expression.
    pub async fn del_pages_by_pattern(&self, pattern: &str) -> Result<usize> {
        let re = Regex::new(pattern).map_err(|e| IndexError::InvalidPattern(e.to_string()))?;
        self.del_pages_matching(&re).await
    }

    pub async fn del_pages_matching(&self, re: &Regex) -> Result<usize> {
        let matched: Vec<String> = self
            .index
            .all_urls()
            .into_iter()
            .filter(|url| re.is_match(url))
            .collect();
        let mut deleted = 0;
        for url in matched {
            if self.delete_normalized(&url).await? {
                deleted += 1;
            }
        }
        info!(target: "page_harness::write", pattern = re.as_str(), deleted, "pages deleted by pattern");
        Ok(deleted)
    }

    /// The stored page with its rows joined, or `None`.
    ///
    /// Input that cannot be normalized is treated as unknown.
    pub async fn aggregate(&self, url: &str) -> Result<Option<PageAggregate>> {
        match normalize_url(url) {
            Ok(n) => load_aggregate(&self.store, &n.url).await,
            Err(_) => Ok(None),
        }
    }

    pub async fn get_page(&self, url: &str) -> Result<Option<PageView>> {
        Ok(self.aggregate(url).await?.as_ref().map(PageView::from))
    }

    pub async fn search(&self, req: &SearchQuery) -> Result<SearchResult> {
        search::search(&self.store, &self.index, &self.params, req).await
    }

    /// Domain or tag values starting with `prefix`, capped at
    /// `suggest_limit`.
    pub fn suggest(&self, prefix: &str, field: SuggestField) -> Vec<String> {
        suggest::suggest(&self.index, prefix, field, self.params.suggest_limit)
    }

    /// Recompute the postings from the store. Commits wait until the new
    /// postings are in place.
    pub async fn rebuild_index(&self) -> Result<()> {
        let _exclusive = self.gate.write().await;
        self.index.rebuild(&self.store).await
    }

    /// `true` when the postings agree with the entity tables.
    pub async fn verify_index(&self) -> Result<bool> {
        let _exclusive = self.gate.write().await;
        self.index.verify(&self.store).await
    }

    pub async fn stats(&self) -> Result<IndexSummary> {
        Ok(IndexSummary {
            tables: self.store.counts().await?,
            index: self.index.stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageContent;
    use crate::store::memory::InMemoryStore;

    async fn open() -> PageIndex<InMemoryStore> {
        PageIndex::open(InMemoryStore::new(), SearchParams::default())
            .await
            .unwrap()
    }

    fn doc(url: &str, title: &str, text: &str) -> PageDoc {
        PageDoc {
            url: url.to_string(),
            content: PageContent {
                title: Some(title.to_string()),
                full_text: Some(text.to_string()),
                ..Default::default()
            },
            screenshot: None,
        }
    }

    #[test]
    fn test_build_page_tokenizes_fields() {
        let page = build_page(&doc("https://www.test.com/wild-fox", "Fox News", "the quick fox")).unwrap();
        assert_eq!(page.url, "test.com/wild-fox");
        assert!(page.terms.contains("quick"));
        assert!(!page.terms.contains("the"));
        assert!(page.title_terms.contains("news"));
        assert!(page.url_terms.contains("wild"));
        assert!(!page.is_stub());
    }

    #[tokio::test]
    async fn test_add_page_returns_normalized_url() {
        let idx = open().await;
        let url = idx
            .add_page(AddPageRequest {
                page_doc: doc("https://www.test.com/test", "t", "body"),
                visits: vec![1],
                bookmark: None,
            })
            .await
            .unwrap();
        assert_eq!(url, "test.com/test");
        assert!(idx.get_page("http://test.com/test/").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_page_terms_unknown_page() {
        let idx = open().await;
        let err = idx
            .add_page_terms(&doc("test.com/none", "", "more words"))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<IndexError>(),
            Some(&IndexError::UnknownPage("test.com/none".to_string()))
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let idx = open().await;
        let err = idx.del_pages_by_pattern("(unclosed").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_stub_page_from_tag() {
        let idx = open().await;
        assert!(idx.add_tag("https://sub.lorem.com/x", "later").await.unwrap());
        let view = idx.get_page("sub.lorem.com/x").await.unwrap().unwrap();
        assert!(view.is_stub);
        assert_eq!(view.domain, "lorem.com");
        assert_eq!(view.tags, vec!["later".to_string()]);
        assert!(!idx.add_tag("sub.lorem.com/x", "later").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_tag_is_ignored() {
        let idx = open().await;
        assert!(!idx.add_tag("test.com/a", "  ").await.unwrap());
        assert!(idx.get_page("test.com/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_misses_on_unknown_urls_leave_no_locks() {
        let idx = open().await;
        assert!(!idx.del_visit("nowhere.com/a", 1).await.unwrap());
        assert!(!idx.del_bookmark("nowhere.com/b").await.unwrap());
        assert!(!idx.del_tag("nowhere.com/c", "x").await.unwrap());
        assert!(!idx
            .update_visit_interaction("nowhere.com/d", 1, VisitInteraction::default())
            .await
            .unwrap());
        assert!(idx.add_page_terms(&doc("nowhere.com/e", "", "words")).await.is_err());
        assert_eq!(idx.del_pages(&["nowhere.com/f"]).await.unwrap(), 0);
        assert!(idx.locks.is_empty());
    }

    #[tokio::test]
    async fn test_get_page_invalid_url_is_none() {
        let idx = open().await;
        assert!(idx.get_page("mailto:nobody").await.unwrap().is_none());
    }
}
