// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bookmark repository.
//!
//! A bookmark is the key `(user_id, blog_id)`; the key itself is the
//! uniqueness constraint. The value is the creation time in unix micros.

use chrono::Utc;
use redb::{ReadableTable, WriteTransaction};

use super::blogs::{self, Page, StoredBlog};
use crate::storage::database::BOOKMARKS;
use crate::storage::{DbError, DbResult, Store};

pub struct BookmarkRepository<'a> {
    store: &'a Store,
}

impl<'a> BookmarkRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn exists(&self, user_id: u64, blog_id: u64) -> DbResult<bool> {
        self.store.read(|txn| {
            let table = txn.open_table(BOOKMARKS)?;
            let found = table.get((user_id, blog_id))?.is_some();
            Ok(found)
        })
    }

    /// Bookmark a blog. Returns false when it was already bookmarked.
    ///
    /// Fails with [`DbError::NotFound`] for an unknown blog.
    pub fn add(&self, user_id: u64, blog_id: u64) -> DbResult<bool> {
        self.store.write(|txn| add_in(txn, user_id, blog_id))
    }

    /// Returns whether a bookmark was removed.
    pub fn remove(&self, user_id: u64, blog_id: u64) -> DbResult<bool> {
        self.store.write(|txn| remove_in(txn, user_id, blog_id))
    }

    /// Flip the bookmark and return the new state.
    pub fn toggle(&self, user_id: u64, blog_id: u64) -> DbResult<bool> {
        self.store.write(|txn| {
            if remove_in(txn, user_id, blog_id)? {
                return Ok(false);
            }
            add_in(txn, user_id, blog_id)?;
            Ok(true)
        })
    }

    /// Bookmarked blogs of a user, most recently bookmarked first.
    ///
    /// Bookmarks whose blog has disappeared are skipped.
    pub fn list_for_user(&self, user_id: u64, page: usize, size: usize) -> DbResult<Page<StoredBlog>> {
        self.store.read(|txn| {
            let mut marks: Vec<(i64, u64)> = {
                let table = txn.open_table(BOOKMARKS)?;
                let mut marks = Vec::new();
                for entry in table.range((user_id, 0u64)..=(user_id, u64::MAX))? {
                    let (key, value) = entry?;
                    let (_, blog_id) = key.value();
                    marks.push((value.value(), blog_id));
                }
                marks
            };
            marks.sort_by(|a, b| b.cmp(a));

            let mut items = Vec::new();
            let mut total = 0;
            let skip = page.saturating_mul(size);
            for (_, blog_id) in marks {
                let Some(blog) = blogs::get_in(txn, blog_id)? else {
                    continue;
                };
                if total >= skip && items.len() < size {
                    items.push(blog);
                }
                total += 1;
            }
            Ok(Page { items, total })
        })
    }
}

fn add_in(txn: &WriteTransaction, user_id: u64, blog_id: u64) -> DbResult<bool> {
    if !blogs::exists_in(txn, blog_id)? {
        return Err(DbError::NotFound(format!("Blog {blog_id}")));
    }
    let mut table = txn.open_table(BOOKMARKS)?;
    if table.get((user_id, blog_id))?.is_some() {
        tracing::debug!(user_id, blog_id, "Bookmark already exists");
        return Ok(false);
    }
    table.insert((user_id, blog_id), Utc::now().timestamp_micros())?;
    Ok(true)
}

fn remove_in(txn: &WriteTransaction, user_id: u64, blog_id: u64) -> DbResult<bool> {
    let mut table = txn.open_table(BOOKMARKS)?;
    let removed = table.remove((user_id, blog_id))?.is_some();
    Ok(removed)
}
