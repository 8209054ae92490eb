// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Comment repository.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::{Deserialize, Serialize};

use super::blogs::Page;
use crate::storage::database::{next_id, COMMENTS};
use crate::storage::{DbError, DbResult, Store};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredComment {
    pub id: u64,
    pub content: String,
    pub author_id: u64,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
}

pub struct CommentRepository<'a> {
    store: &'a Store,
}

impl<'a> CommentRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create(&self, content: &str, author_id: u64, author_username: &str) -> DbResult<StoredComment> {
        self.store.write(|txn| {
            let comment = StoredComment {
                id: next_id(txn, "comments")?,
                content: content.to_string(),
                author_id,
                author_username: author_username.to_string(),
                created_at: Utc::now(),
            };
            put(txn, &comment)?;
            Ok(comment)
        })
    }

    pub fn get(&self, id: u64) -> DbResult<Option<StoredComment>> {
        self.store.read(|txn| {
            let table = txn.open_table(COMMENTS)?;
            let comment = match table.get(id)? {
                Some(raw) => Some(serde_json::from_slice(raw.value())?),
                None => None,
            };
            Ok(comment)
        })
    }

    /// Page of comments in id order.
    pub fn list(&self, page: usize, size: usize) -> DbResult<Page<StoredComment>> {
        self.store.read(|txn| {
            let table = txn.open_table(COMMENTS)?;
            let total = table.len()? as usize;
            let mut items = Vec::new();
            for entry in table.iter()?.skip(page.saturating_mul(size)).take(size) {
                let (_, raw) = entry?;
                items.push(serde_json::from_slice(raw.value())?);
            }
            Ok(Page { items, total })
        })
    }

    pub fn update_content(&self, id: u64, content: &str) -> DbResult<StoredComment> {
        self.store.write(|txn| {
            let mut comment: StoredComment = {
                let table = txn.open_table(COMMENTS)?;
                let raw = table
                    .get(id)?
                    .ok_or_else(|| DbError::NotFound(format!("Comment {id}")))?;
                serde_json::from_slice(raw.value())?
            };
            comment.content = content.to_string();
            put(txn, &comment)?;
            Ok(comment)
        })
    }

    pub fn delete(&self, id: u64) -> DbResult<()> {
        self.store.write(|txn| {
            let mut table = txn.open_table(COMMENTS)?;
            let removed = table.remove(id)?.is_some();
            if !removed {
                return Err(DbError::NotFound(format!("Comment {id}")));
            }
            Ok(())
        })
    }
}

fn put(txn: &WriteTransaction, comment: &StoredComment) -> DbResult<()> {
    let bytes = serde_json::to_vec(comment)?;
    let mut table = txn.open_table(COMMENTS)?;
    table.insert(comment.id, bytes.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;

    #[test]
    fn create_list_update_delete() {
        let (store, _dir) = temp_store();
        let repo = CommentRepository::new(&store);
        for i in 0..12 {
            repo.create(&format!("comment {i}"), 1, "ada").unwrap();
        }

        let first = repo.list(0, 10).unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].id, 1);
        assert_eq!(repo.list(1, 10).unwrap().items.len(), 2);

        let updated = repo.update_content(3, "edited").unwrap();
        assert_eq!(updated.content, "edited");
        assert_eq!(repo.get(3).unwrap().unwrap().content, "edited");

        repo.delete(3).unwrap();
        assert!(repo.get(3).unwrap().is_none());
        assert!(matches!(repo.delete(3), Err(DbError::NotFound(_))));
        assert!(matches!(repo.update_content(99, "x"), Err(DbError::NotFound(_))));
    }
}
