// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blog repository.
//!
//! Blog ids come from a sequence, so reverse key order is newest first.
//! Tags are stored lowercase on the blog and registered in the `tags` set.

use chrono::{DateTime, Utc};
use redb::{ReadTransaction, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

use crate::storage::database::{next_id, BLOGS, TAGS};
use crate::storage::{DbResult, Store};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredBlog {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author_id: u64,
    /// Denormalised for author filtering; usernames never change.
    pub author_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author_id: u64,
    pub author_username: String,
}

/// Conjunctive blog filter. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    /// Matches blogs carrying any of these (lowercase) tags.
    pub tags: Vec<String>,
    /// Case-insensitive author username.
    pub author: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Case-insensitive title substring.
    pub title_query: Option<String>,
}

impl BlogFilter {
    pub fn matches(&self, blog: &StoredBlog) -> bool {
        if !self.tags.is_empty() && !blog.tags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        if let Some(author) = &self.author {
            if blog.author_username.to_lowercase() != author.to_lowercase() {
                return false;
            }
        }
        if self.created_from.is_some_and(|from| blog.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| blog.created_at > to) {
            return false;
        }
        if let Some(q) = &self.title_query {
            if !blog.title.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Normalise tags: trimmed, lowercase, deduplicated, order kept.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub struct BlogRepository<'a> {
    store: &'a Store,
}

impl<'a> BlogRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create(&self, blog: NewBlog) -> DbResult<StoredBlog> {
        self.store.write(|txn| {
            let now = Utc::now();
            let stored = StoredBlog {
                id: next_id(txn, "blogs")?,
                title: blog.title,
                content: blog.content,
                tags: normalize_tags(&blog.tags),
                author_id: blog.author_id,
                author_username: blog.author_username,
                created_at: now,
                updated_at: now,
            };
            {
                let mut tags = txn.open_table(TAGS)?;
                for tag in &stored.tags {
                    tags.insert(tag.as_str(), ())?;
                }
            }
            put(txn, &stored)?;
            tracing::debug!(blog_id = stored.id, author_id = stored.author_id, "Blog created");
            Ok(stored)
        })
    }

    pub fn get(&self, id: u64) -> DbResult<Option<StoredBlog>> {
        self.store.read(|txn| get_in(txn, id))
    }

    /// Newest-first page of the blogs matching `filter`.
    pub fn list(&self, filter: &BlogFilter, page: usize, size: usize) -> DbResult<Page<StoredBlog>> {
        self.store.read(|txn| {
            let table = txn.open_table(BLOGS)?;
            let mut total = 0;
            let mut items = Vec::new();
            let skip = page.saturating_mul(size);
            for entry in table.iter()?.rev() {
                let (_, raw) = entry?;
                let blog: StoredBlog = serde_json::from_slice(raw.value())?;
                if !filter.matches(&blog) {
                    continue;
                }
                if total >= skip && items.len() < size {
                    items.push(blog);
                }
                total += 1;
            }
            Ok(Page { items, total })
        })
    }
}

pub(crate) fn get_in(txn: &ReadTransaction, id: u64) -> DbResult<Option<StoredBlog>> {
    let table = txn.open_table(BLOGS)?;
    let blog = match table.get(id)? {
        Some(raw) => Some(serde_json::from_slice(raw.value())?),
        None => None,
    };
    Ok(blog)
}

/// Whether a blog exists, from inside a write transaction.
pub(crate) fn exists_in(txn: &WriteTransaction, id: u64) -> DbResult<bool> {
    let table = txn.open_table(BLOGS)?;
    let found = table.get(id)?.is_some();
    Ok(found)
}

fn put(txn: &WriteTransaction, blog: &StoredBlog) -> DbResult<()> {
    let bytes = serde_json::to_vec(blog)?;
    let mut table = txn.open_table(BLOGS)?;
    table.insert(blog.id, bytes.as_slice())?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;

    fn registered_tags(store: &Store) -> Vec<String> {
        store
            .read(|txn| {
                let table = txn.open_table(TAGS)?;
                let mut tags = Vec::new();
                for entry in table.iter()? {
                    let (key, _) = entry?;
                    tags.push(key.value().to_string());
                }
                Ok(tags)
            })
            .unwrap()
    }

    pub(crate) fn new_blog(title: &str, author: &str, tags: &[&str]) -> NewBlog {
        NewBlog {
            title: title.to_string(),
            content: "Some content".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author_id: 1,
            author_username: author.to_string(),
        }
    }

    #[test]
    fn tags_are_normalized_and_registered() {
        let (store, _dir) = temp_store();
        let repo = BlogRepository::new(&store);
        let blog = repo
            .create(new_blog("Hello Rust", "ada", &[" Rust ", "rust", "Async"]))
            .unwrap();
        assert_eq!(blog.tags, vec!["rust", "async"]);
        assert_eq!(registered_tags(&store), vec!["async", "rust"]);
    }

    #[test]
    fn list_is_newest_first_and_paged() {
        let (store, _dir) = temp_store();
        let repo = BlogRepository::new(&store);
        for i in 1..=5 {
            repo.create(new_blog(&format!("Post number {i}"), "ada", &[])).unwrap();
        }

        let first = repo.list(&BlogFilter::default(), 0, 2).unwrap();
        assert_eq!(first.total, 5);
        let ids: Vec<u64> = first.items.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![5, 4]);

        let last = repo.list(&BlogFilter::default(), 2, 2).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].id, 1);
    }

    #[test]
    fn filters_combine_with_and() {
        let (store, _dir) = temp_store();
        let repo = BlogRepository::new(&store);
        repo.create(new_blog("Rust ownership", "Ada", &["rust"])).unwrap();
        repo.create(new_blog("Rust lifetimes", "grace", &["rust"])).unwrap();
        repo.create(new_blog("Cooking pasta", "ada", &["food"])).unwrap();

        let filter = BlogFilter {
            tags: vec!["rust".into(), "go".into()],
            author: Some("ADA".into()),
            ..BlogFilter::default()
        };
        let page = repo.list(&filter, 0, 20).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Rust ownership");

        let by_title = BlogFilter {
            title_query: Some("LIFE".into()),
            ..BlogFilter::default()
        };
        assert_eq!(repo.list(&by_title, 0, 20).unwrap().items[0].author_username, "grace");

        // Author and title both fold case beyond ASCII
        repo.create(new_blog("Życie w Rust", "Łukasz", &[])).unwrap();
        let by_author = BlogFilter {
            author: Some("łUKASZ".into()),
            title_query: Some("życie".into()),
            ..BlogFilter::default()
        };
        assert_eq!(repo.list(&by_author, 0, 20).unwrap().total, 1);

        let future = BlogFilter {
            created_from: Some(Utc::now() + chrono::Duration::hours(1)),
            ..BlogFilter::default()
        };
        assert_eq!(repo.list(&future, 0, 20).unwrap().total, 0);
    }
}
