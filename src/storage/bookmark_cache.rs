// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for bookmark list first-page lookups.
//!
//! Caches the first page of bookmarked blogs per user to avoid repeated
//! redb scans for the most common query. Any bookmark change by a user
//! invalidates that user's entry.
//!
//! Every invalidation also bumps a per-user generation. Readers capture
//! the generation before going to the database and only store the page if
//! it is unchanged, so a page read before a concurrent change is never
//! cached after it.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::repository::{Page, StoredBlog};

struct CacheEntry {
    page: Page<StoredBlog>,
    inserted_at: Instant,
}

struct Inner {
    pages: LruCache<u64, CacheEntry>,
    generations: HashMap<u64, u64>,
}

/// In-process LRU cache keyed by user id.
pub struct BookmarkCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl BookmarkCache {
    /// - `capacity`: Max number of users to cache.
    /// - `ttl`: Time-to-live for each cache entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pages: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
                generations: HashMap::new(),
            }),
            ttl,
        }
    }

    /// Cached first page for a user, if present and fresh.
    pub fn get_first_page(&self, user_id: u64) -> Option<Page<StoredBlog>> {
        let mut inner = self.inner.lock().ok()?;
        if let Some(entry) = inner.pages.get(&user_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.page.clone());
            }
            inner.pages.pop(&user_id);
        }
        None
    }

    /// Current generation for a user. Capture it before reading the page
    /// that will be handed to [`put_first_page`](Self::put_first_page).
    pub fn generation(&self, user_id: u64) -> u64 {
        self.inner
            .lock()
            .map(|inner| inner.generations.get(&user_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Store a page read at `generation`. Returns false, storing nothing,
    /// when the user's bookmarks were invalidated since.
    pub fn put_first_page(&self, user_id: u64, generation: u64, page: Page<StoredBlog>) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.generations.get(&user_id).copied().unwrap_or(0) != generation {
            return false;
        }
        inner.pages.put(
            user_id,
            CacheEntry {
                page,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    pub fn invalidate(&self, user_id: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pages.pop(&user_id);
            let generation = inner.generations.entry(user_id).or_insert(0);
            *generation = generation.wrapping_add(1);
        }
    }
}

impl Default for BookmarkCache {
    fn default() -> Self {
        Self::new(1024, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_page() -> Page<StoredBlog> {
        let now = Utc::now();
        Page {
            items: vec![StoredBlog {
                id: 1,
                title: "Cached post".to_string(),
                content: "body".to_string(),
                tags: vec![],
                author_id: 1,
                author_username: "ada".to_string(),
                created_at: now,
                updated_at: now,
            }],
            total: 1,
        }
    }

    #[test]
    fn put_get_and_invalidate() {
        let cache = BookmarkCache::new(10, Duration::from_secs(300));
        assert!(cache.get_first_page(7).is_none());

        cache.put_first_page(7, 0, sample_page());
        assert_eq!(cache.get_first_page(7).unwrap().items[0].title, "Cached post");
        assert!(cache.get_first_page(8).is_none());

        cache.invalidate(7);
        assert!(cache.get_first_page(7).is_none());
    }

    #[test]
    fn entries_expire() {
        let cache = BookmarkCache::new(10, Duration::from_millis(1));
        cache.put_first_page(7, 0, sample_page());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_first_page(7).is_none());
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cache = BookmarkCache::new(1, Duration::from_secs(300));
        cache.put_first_page(1, 0, sample_page());
        cache.put_first_page(2, 0, sample_page());
        assert!(cache.get_first_page(1).is_none());
        assert!(cache.get_first_page(2).is_some());
    }

    #[test]
    fn page_read_before_invalidate_is_not_cached() {
        let cache = BookmarkCache::new(10, Duration::from_secs(300));
        let generation = cache.generation(7);

        // A bookmark change lands while the page is being read
        cache.invalidate(7);
        assert!(!cache.put_first_page(7, generation, sample_page()));
        assert!(cache.get_first_page(7).is_none());

        let generation = cache.generation(7);
        assert!(cache.put_first_page(7, generation, sample_page()));
        assert!(cache.get_first_page(7).is_some());
    }

    #[test]
    fn generations_are_per_user() {
        let cache = BookmarkCache::new(10, Duration::from_secs(300));
        let generation = cache.generation(7);
        cache.invalidate(8);
        assert!(cache.put_first_page(7, generation, sample_page()));
        assert_eq!(cache.generation(8), 1);
    }
}
