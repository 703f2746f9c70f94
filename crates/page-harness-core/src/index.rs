//! Derived postings for term and value lookups.
//!
//! [`PostingsIndex`] maps each body/title/URL term, and each domain,
//! hostname and tag value, to the set of page URLs carrying it. It is pure
//! derived state: the entity tables are authoritative and the whole index
//! can be recomputed from them with [`PostingsIndex::rebuild`].
//!
//! Updates are diff-based. The index remembers the [`IndexedFields`] it
//! last saw for every URL; [`PostingsIndex::update`] removes the URL from
//! postings of values that disappeared and adds it to postings of values
//! that appeared. Empty postings are dropped so value listings (used by
//! suggestions) only contain live values.
//!
//! # Thread Safety
//!
//! One `parking_lot::RwLock` guards all maps. Writers hold it only for the
//! in-memory diff, never across storage I/O.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::models::{PageAggregate, PageRecord};
use crate::store::Store;

pub type Postings = BTreeSet<String>;

/// Term index selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermField {
    Body,
    Title,
    Url,
}

/// Value index selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueField {
    Domain,
    Hostname,
    Tag,
}

/// The slice of a page that the index depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedFields {
    pub terms: BTreeSet<String>,
    pub title_terms: BTreeSet<String>,
    pub url_terms: BTreeSet<String>,
    pub domain: String,
    pub hostname: String,
    pub tags: BTreeSet<String>,
}

impl IndexedFields {
    pub fn from_page(page: &PageRecord, tags: BTreeSet<String>) -> Self {
        Self {
            terms: page.terms.clone(),
            title_terms: page.title_terms.clone(),
            url_terms: page.url_terms.clone(),
            domain: page.domain.clone(),
            hostname: page.hostname.clone(),
            tags,
        }
    }

    pub fn from_aggregate(agg: &PageAggregate) -> Self {
        Self::from_page(&agg.page, agg.tags.clone())
    }

    fn terms(&self, field: TermField) -> &BTreeSet<String> {
        match field {
            TermField::Body => &self.terms,
            TermField::Title => &self.title_terms,
            TermField::Url => &self.url_terms,
        }
    }

    fn values(&self, field: ValueField) -> BTreeSet<String> {
        match field {
            ValueField::Domain => single(&self.domain),
            ValueField::Hostname => single(&self.hostname),
            ValueField::Tag => self.tags.clone(),
        }
    }
}

fn single(value: &str) -> BTreeSet<String> {
    if value.is_empty() {
        BTreeSet::new()
    } else {
        BTreeSet::from([value.to_string()])
    }
}

const TERM_FIELDS: [TermField; 3] = [TermField::Body, TermField::Title, TermField::Url];
const VALUE_FIELDS: [ValueField; 3] = [ValueField::Domain, ValueField::Hostname, ValueField::Tag];

/// Distinct-key counts across the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub body_terms: usize,
    pub title_terms: usize,
    pub url_terms: usize,
    pub domains: usize,
    pub hostnames: usize,
    pub tags: usize,
}

#[derive(Default)]
struct Inner {
    terms: HashMap<TermField, HashMap<String, Postings>>,
    values: HashMap<ValueField, BTreeMap<String, Postings>>,
    docs: HashMap<String, IndexedFields>,
}

impl Inner {
    fn diff_into<M>(map: &mut M, url: &str, old: &BTreeSet<String>, new: &BTreeSet<String>)
    where
        M: PostingsMap,
    {
        for gone in old.difference(new) {
            map.remove_url(gone, url);
        }
        for added in new.difference(old) {
            map.add_url(added, url);
        }
    }

    fn update(&mut self, url: &str, new: Option<IndexedFields>) {
        let old = self.docs.remove(url).unwrap_or_default();
        let new_fields = new.clone().unwrap_or_default();

        for field in TERM_FIELDS {
            let map = self.terms.entry(field).or_default();
            Self::diff_into(map, url, old.terms(field), new_fields.terms(field));
        }
        for field in VALUE_FIELDS {
            let map = self.values.entry(field).or_default();
            Self::diff_into(map, url, &old.values(field), &new_fields.values(field));
        }

        if let Some(fields) = new {
            self.docs.insert(url.to_string(), fields);
        }
    }
}

/// Shared add/remove behavior over the two map flavors used above.
trait PostingsMap {
    fn add_url(&mut self, key: &str, url: &str);
    fn remove_url(&mut self, key: &str, url: &str);
}

impl PostingsMap for HashMap<String, Postings> {
    fn add_url(&mut self, key: &str, url: &str) {
        self.entry(key.to_string()).or_default().insert(url.to_string());
    }

    fn remove_url(&mut self, key: &str, url: &str) {
        if let Some(postings) = self.get_mut(key) {
            postings.remove(url);
            if postings.is_empty() {
                self.remove(key);
            }
        }
    }
}

impl PostingsMap for BTreeMap<String, Postings> {
    fn add_url(&mut self, key: &str, url: &str) {
        self.entry(key.to_string()).or_default().insert(url.to_string());
    }

    fn remove_url(&mut self, key: &str, url: &str) {
        if let Some(postings) = self.get_mut(key) {
            postings.remove(url);
            if postings.is_empty() {
                self.remove(key);
            }
        }
    }
}

/// Inverted index over pages.
#[derive(Default)]
pub struct PostingsIndex {
    inner: RwLock<Inner>,
}

impl PostingsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the indexed state of `url`; `None` removes the page.
    pub fn update(&self, url: &str, new: Option<IndexedFields>) {
        self.inner.write().update(url, new);
    }

    /// Postings for `term` in one term index. Empty if none match.
    pub fn term_postings(&self, term: &str, field: TermField) -> Postings {
        self.inner
            .read()
            .terms
            .get(&field)
            .and_then(|m| m.get(term))
            .cloned()
            .unwrap_or_default()
    }

    /// Union of postings for `term` across body, title and URL indices.
    pub fn any_term_postings(&self, term: &str) -> Postings {
        let inner = self.inner.read();
        let mut out = Postings::new();
        for field in TERM_FIELDS {
            if let Some(p) = inner.terms.get(&field).and_then(|m| m.get(term)) {
                out.extend(p.iter().cloned());
            }
        }
        out
    }

    /// Postings for an exact value in one value index. Empty if none match.
    pub fn value_postings(&self, value: &str, field: ValueField) -> Postings {
        self.inner
            .read()
            .values
            .get(&field)
            .and_then(|m| m.get(value))
            .cloned()
            .unwrap_or_default()
    }

    /// Pages on `domain`, matched against both registrable domain and
    /// full hostname.
    pub fn domain_postings(&self, domain: &str) -> Postings {
        let mut out = self.value_postings(domain, ValueField::Domain);
        out.extend(self.value_postings(domain, ValueField::Hostname));
        out
    }

    /// Distinct live values of a value index, ascending.
    pub fn values(&self, field: ValueField) -> Vec<String> {
        self.inner
            .read()
            .values
            .get(&field)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every indexed page URL.
    pub fn all_urls(&self) -> Postings {
        self.inner.read().docs.keys().cloned().collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.read().docs.contains_key(url)
    }

    /// Whether any of `terms` appears in `field` for `url`.
    pub fn has_any_term(&self, url: &str, terms: &[String], field: TermField) -> bool {
        let inner = self.inner.read();
        match inner.docs.get(url) {
            Some(doc) => {
                let set = doc.terms(field);
                terms.iter().any(|t| set.contains(t))
            }
            None => false,
        }
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        let term_count = |f: TermField| inner.terms.get(&f).map(|m| m.len()).unwrap_or(0);
        let value_count = |f: ValueField| inner.values.get(&f).map(|m| m.len()).unwrap_or(0);
        IndexStats {
            documents: inner.docs.len(),
            body_terms: term_count(TermField::Body),
            title_terms: term_count(TermField::Title),
            url_terms: term_count(TermField::Url),
            domains: value_count(ValueField::Domain),
            hostnames: value_count(ValueField::Hostname),
            tags: value_count(ValueField::Tag),
        }
    }

    /// Recompute every posting from the store's page and tag tables.
    pub async fn rebuild<S: Store + ?Sized>(&self, store: &S) -> Result<()> {
        let fresh = Self::build(store).await?;
        let fresh_inner = fresh.inner.into_inner();
        let documents = fresh_inner.docs.len();
        *self.inner.write() = fresh_inner;
        info!(target: "page_harness::index", documents, "postings rebuilt");
        Ok(())
    }

    /// Compare the live postings with a fresh build from the store.
    ///
    /// Returns `true` when they agree.
    pub async fn verify<S: Store + ?Sized>(&self, store: &S) -> Result<bool> {
        let fresh = Self::build(store).await?;
        let fresh_inner = fresh.inner.read();
        let live = self.inner.read();
        let same = live.docs == fresh_inner.docs
            && TERM_FIELDS.iter().all(|f| {
                live.terms.get(f).cloned().unwrap_or_default()
                    == fresh_inner.terms.get(f).cloned().unwrap_or_default()
            })
            && VALUE_FIELDS.iter().all(|f| {
                live.values.get(f).cloned().unwrap_or_default()
                    == fresh_inner.values.get(f).cloned().unwrap_or_default()
            });
        if !same {
            debug!(target: "page_harness::index", "postings diverge from entity tables");
        }
        Ok(same)
    }

    async fn build<S: Store + ?Sized>(store: &S) -> Result<Self> {
        let pages = store.scan_pages().await?;
        let mut tags_by_url: HashMap<String, BTreeSet<String>> = HashMap::new();
        for tag in store.scan_tags().await? {
            tags_by_url.entry(tag.url).or_default().insert(tag.name);
        }

        let index = Self::new();
        {
            let mut inner = index.inner.write();
            for page in &pages {
                let tags = tags_by_url.remove(&page.url).unwrap_or_default();
                inner.update(&page.url, Some(IndexedFields::from_page(page, tags)));
            }
        }
        Ok(index)
    }
}
