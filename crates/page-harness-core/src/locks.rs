//! Per-URL write serialization.
//!
//! Writes to the same normalized URL run one at a time; writes to different
//! URLs proceed concurrently. Each URL gets its own async mutex, created on
//! first use and dropped again when the page is deleted.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct UrlLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UrlLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `url`.
    ///
    /// The `DashMap` shard guard is released before awaiting so other URLs
    /// are never blocked behind this one.
    pub async fn acquire(&self, url: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Forget the lock for a deleted page.
    ///
    /// Called by the current guard holder. The entry is kept while any
    /// other writer is queued on it, so two writers never end up on
    /// different mutexes for the same URL.
    pub fn remove(&self, url: &str) {
        // One reference in the map, at most one in the caller's guard.
        self.locks.remove_if(url, |_, lock| Arc::strong_count(lock) <= 2);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
