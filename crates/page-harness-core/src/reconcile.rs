//! Two-phase reconciliation of a page's rows.
//!
//! Every write first builds the page's desired [`PageAggregate`] in memory,
//! then [`compute_diff`] compares it against the aggregate currently in the
//! store and yields exactly the row inserts and deletes needed. Visits and
//! tags use set replacement: stored rows absent from the desired aggregate
//! are deleted. A desired state of `None` deletes the page and every row
//! that references it.
//!
//! The diff is pure; [`RowDiff::into_batch`] turns it into a
//! [`WriteBatch`] that the store applies atomically.

use std::collections::BTreeMap;

use crate::models::{Bookmark, PageAggregate, PageRecord, Tag, Timestamp, Visit};
use crate::store::{Mutation, WriteBatch};

/// Row changes for one page URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowDiff {
    pub url: String,
    pub put_page: Option<PageRecord>,
    pub delete_page: bool,
    pub put_visits: Vec<Visit>,
    pub delete_visits: Vec<Timestamp>,
    pub put_bookmark: Option<Bookmark>,
    pub delete_bookmark: bool,
    pub put_tags: Vec<String>,
    pub delete_tags: Vec<String>,
}

impl RowDiff {
    pub fn is_empty(&self) -> bool {
        self.put_page.is_none()
            && !self.delete_page
            && self.put_visits.is_empty()
            && self.delete_visits.is_empty()
            && self.put_bookmark.is_none()
            && !self.delete_bookmark
            && self.put_tags.is_empty()
            && self.delete_tags.is_empty()
    }

    /// Parent row first on insert, children first on delete.
    pub fn into_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        let url = self.url;

        if let Some(page) = self.put_page {
            batch.push(Mutation::PutPage(page));
        }
        for time in self.delete_visits {
            batch.push(Mutation::DeleteVisit {
                url: url.clone(),
                time,
            });
        }
        for visit in self.put_visits {
            batch.push(Mutation::PutVisit(visit));
        }
        if self.delete_bookmark {
            batch.push(Mutation::DeleteBookmark { url: url.clone() });
        }
        if let Some(bookmark) = self.put_bookmark {
            batch.push(Mutation::PutBookmark(bookmark));
        }
        for name in self.delete_tags {
            batch.push(Mutation::DeleteTag {
                url: url.clone(),
                name,
            });
        }
        for name in self.put_tags {
            batch.push(Mutation::PutTag(Tag {
                url: url.clone(),
                name,
            }));
        }
        if self.delete_page {
            batch.push(Mutation::DeletePage { url });
        }
        batch
    }
}

/// Diff the stored aggregate against the desired one.
pub fn compute_diff(
    url: &str,
    existing: Option<&PageAggregate>,
    desired: Option<&PageAggregate>,
) -> RowDiff {
    let mut diff = RowDiff {
        url: url.to_string(),
        ..Default::default()
    };

    let existing_visits: BTreeMap<Timestamp, &Visit> = existing
        .map(|e| e.visits.iter().map(|v| (v.time, v)).collect())
        .unwrap_or_default();

    match desired {
        Some(want) => {
            if existing.map(|e| &e.page) != Some(&want.page) {
                diff.put_page = Some(want.page.clone());
            }

            let wanted_times: BTreeMap<Timestamp, &Visit> =
                want.visits.iter().map(|v| (v.time, v)).collect();
            for (time, visit) in &wanted_times {
                if existing_visits.get(time) != Some(visit) {
                    diff.put_visits.push((*visit).clone());
                }
            }
            diff.delete_visits = existing_visits
                .keys()
                .filter(|t| !wanted_times.contains_key(t))
                .copied()
                .collect();

            let existing_bookmark = existing.and_then(|e| e.bookmark.as_ref());
            match (&want.bookmark, existing_bookmark) {
                (Some(b), Some(old)) if b == old => {}
                (Some(b), _) => diff.put_bookmark = Some(b.clone()),
                (None, Some(_)) => diff.delete_bookmark = true,
                (None, None) => {}
            }

            let existing_tags = existing.map(|e| e.tags.clone()).unwrap_or_default();
            diff.put_tags = want.tags.difference(&existing_tags).cloned().collect();
            diff.delete_tags = existing_tags.difference(&want.tags).cloned().collect();
        }
        None => {
            if let Some(old) = existing {
                diff.delete_page = true;
                diff.delete_visits = existing_visits.keys().copied().collect();
                diff.delete_bookmark = old.bookmark.is_some();
                diff.delete_tags = old.tags.iter().cloned().collect();
            }
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitInteraction;
    use std::collections::BTreeSet;

    fn aggregate(url: &str) -> PageAggregate {
        PageAggregate::new(PageRecord {
            url: url.to_string(),
            full_url: url.to_string(),
            domain: "test.com".to_string(),
            hostname: "test.com".to_string(),
            full_title: None,
            text: None,
            terms: BTreeSet::new(),
            url_terms: BTreeSet::new(),
            title_terms: BTreeSet::new(),
            screenshot: None,
            lang: None,
            canonical_url: None,
            description: None,
            keywords: Vec::new(),
        })
    }

    #[test]
    fn test_new_page_inserts_everything() {
        let mut want = aggregate("test.com/a");
        want.add_visit(1, VisitInteraction::default());
        want.set_bookmark(2);
        want.add_tag("good");

        let diff = compute_diff("test.com/a", None, Some(&want));
        assert!(diff.put_page.is_some());
        assert_eq!(diff.put_visits.len(), 1);
        assert!(diff.put_bookmark.is_some());
        assert_eq!(diff.put_tags, vec!["good".to_string()]);
        assert!(diff.delete_visits.is_empty());

        let batch = diff.into_batch();
        assert!(matches!(batch.mutations[0], Mutation::PutPage(_)));
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_unchanged_is_empty() {
        let mut agg = aggregate("test.com/a");
        agg.add_visit(1, VisitInteraction::default());
        agg.add_tag("good");
        let diff = compute_diff("test.com/a", Some(&agg), Some(&agg));
        assert!(diff.is_empty());
        assert!(diff.into_batch().is_empty());
    }

    #[test]
    fn test_set_replacement_for_visits_and_tags() {
        let mut old = aggregate("test.com/a");
        old.add_visit(1, VisitInteraction::default());
        old.add_visit(2, VisitInteraction::default());
        old.add_tag("keep");
        old.add_tag("drop");

        let mut want = old.clone();
        want.remove_visit(1);
        want.add_visit(3, VisitInteraction::default());
        want.del_tag("drop");
        want.add_tag("new");

        let diff = compute_diff("test.com/a", Some(&old), Some(&want));
        assert!(diff.put_page.is_none());
        assert_eq!(diff.delete_visits, vec![1]);
        assert_eq!(diff.put_visits.iter().map(|v| v.time).collect::<Vec<_>>(), vec![3]);
        assert_eq!(diff.delete_tags, vec!["drop".to_string()]);
        assert_eq!(diff.put_tags, vec!["new".to_string()]);
    }

    #[test]
    fn test_changed_interaction_is_rewritten() {
        let mut old = aggregate("test.com/a");
        old.add_visit(1, VisitInteraction::default());
        let mut want = old.clone();
        want.add_visit(
            1,
            VisitInteraction {
                scroll_perc: Some(50.0),
                ..Default::default()
            },
        );
        let diff = compute_diff("test.com/a", Some(&old), Some(&want));
        assert_eq!(diff.put_visits.len(), 1);
        assert!(diff.delete_visits.is_empty());
    }

    #[test]
    fn test_bookmark_transitions() {
        let mut old = aggregate("test.com/a");
        old.set_bookmark(5);

        let mut moved = old.clone();
        moved.set_bookmark(6);
        let diff = compute_diff("test.com/a", Some(&old), Some(&moved));
        assert_eq!(diff.put_bookmark.map(|b| b.time), Some(6));
        assert!(!diff.delete_bookmark);

        let mut removed = old.clone();
        removed.del_bookmark();
        let diff = compute_diff("test.com/a", Some(&old), Some(&removed));
        assert!(diff.delete_bookmark);
    }

    #[test]
    fn test_cascade_deletes_children_before_page() {
        let mut old = aggregate("test.com/a");
        old.add_visit(1, VisitInteraction::default());
        old.set_bookmark(2);
        old.add_tag("t");

        let diff = compute_diff("test.com/a", Some(&old), None);
        assert!(diff.delete_page);
        let batch = diff.into_batch();
        assert_eq!(batch.len(), 4);
        assert!(matches!(
            batch.mutations.last(),
            Some(Mutation::DeletePage { .. })
        ));
    }

    #[test]
    fn test_absent_to_absent_is_empty() {
        assert!(compute_diff("test.com/a", None, None).is_empty());
    }
}
