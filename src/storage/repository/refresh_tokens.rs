// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refresh token repository.
//!
//! Records are soft-revoked, never deleted. A secondary index
//! `(user_id, token_id)` lets a password reset revoke every session of a
//! user inside one write transaction.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

use crate::storage::database::{REFRESH_TOKENS, REFRESH_TOKENS_BY_USER};
use crate::storage::{DbError, DbResult, Store};

/// Persisted refresh credential. Holds only a hash of the secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRefreshToken {
    /// Lookup id (UUID), the part before the dot in the raw token.
    pub id: String,
    pub user_id: u64,
    pub secret_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredRefreshToken {
    /// Not revoked and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Repository for refresh token records.
pub struct RefreshTokenRepository<'a> {
    store: &'a Store,
}

impl<'a> RefreshTokenRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new record. Fails with [`DbError::Conflict`] if the id is taken.
    pub fn insert(&self, token: &StoredRefreshToken) -> DbResult<()> {
        self.store.write(|txn| insert_in(txn, token))
    }

    pub fn find(&self, id: &str) -> DbResult<Option<StoredRefreshToken>> {
        self.store.read(|txn| {
            let table = txn.open_table(REFRESH_TOKENS)?;
            match table.get(id)? {
                Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
                None => Ok(None),
            }
        })
    }

    /// Revoke `old_id` and insert its successor as one unit.
    ///
    /// `accept` sees the current record inside the write transaction; when it
    /// returns false (or the record is missing) nothing changes and `None` is
    /// returned. Otherwise `successor` builds the new record from the old one.
    /// Writers are serialized, so of two concurrent rotations of the same
    /// token only the first can observe it unrevoked.
    pub fn rotate(
        &self,
        old_id: &str,
        accept: impl FnOnce(&StoredRefreshToken) -> bool,
        successor: impl FnOnce(&StoredRefreshToken) -> StoredRefreshToken,
    ) -> DbResult<Option<StoredRefreshToken>> {
        self.store.write(|txn| {
            let Some(mut old) = get_in(txn, old_id)? else {
                return Ok(None);
            };
            if !accept(&old) {
                return Ok(None);
            }
            let next = successor(&old);
            old.revoked = true;
            put(txn, &old)?;
            insert_in(txn, &next)?;
            Ok(Some(next))
        })
    }

    /// Revoke a single record. Returns whether it was active.
    pub fn revoke(&self, id: &str) -> DbResult<bool> {
        self.store.write(|txn| {
            let Some(mut token) = get_in(txn, id)? else {
                return Ok(false);
            };
            if !token.is_active(Utc::now()) {
                return Ok(false);
            }
            token.revoked = true;
            put(txn, &token)?;
            Ok(true)
        })
    }

    /// Revoke every active record of a user. Returns how many were revoked.
    pub fn revoke_all_for_user(&self, user_id: u64, now: DateTime<Utc>) -> DbResult<usize> {
        self.store.write(|txn| {
            let ids: Vec<String> = {
                let index = txn.open_table(REFRESH_TOKENS_BY_USER)?;
                let mut ids = Vec::new();
                for entry in index.range((user_id, "")..)? {
                    let (key, _) = entry?;
                    let (owner, token_id) = key.value();
                    if owner != user_id {
                        break;
                    }
                    ids.push(token_id.to_string());
                }
                ids
            };

            let mut revoked = 0;
            for id in ids {
                if let Some(mut token) = get_in(txn, &id)? {
                    if token.is_active(now) {
                        token.revoked = true;
                        put(txn, &token)?;
                        revoked += 1;
                    }
                }
            }
            Ok(revoked)
        })
    }
}

fn get_in(txn: &WriteTransaction, id: &str) -> DbResult<Option<StoredRefreshToken>> {
    let table = txn.open_table(REFRESH_TOKENS)?;
    let token = match table.get(id)? {
        Some(raw) => Some(serde_json::from_slice(raw.value())?),
        None => None,
    };
    Ok(token)
}

fn put(txn: &WriteTransaction, token: &StoredRefreshToken) -> DbResult<()> {
    let bytes = serde_json::to_vec(token)?;
    let mut table = txn.open_table(REFRESH_TOKENS)?;
    table.insert(token.id.as_str(), bytes.as_slice())?;
    Ok(())
}

fn insert_in(txn: &WriteTransaction, token: &StoredRefreshToken) -> DbResult<()> {
    if get_in(txn, &token.id)?.is_some() {
        return Err(DbError::Conflict(format!("Refresh token {}", token.id)));
    }
    put(txn, token)?;
    let mut index = txn.open_table(REFRESH_TOKENS_BY_USER)?;
    index.insert((token.user_id, token.id.as_str()), ())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;
    use chrono::Duration;

    fn token(id: &str, user_id: u64, ttl: Duration) -> StoredRefreshToken {
        let now = Utc::now();
        StoredRefreshToken {
            id: id.to_string(),
            user_id,
            secret_hash: format!("hash-{id}"),
            expires_at: now + ttl,
            revoked: false,
            created_at: now,
        }
    }

    #[test]
    fn duplicate_id_is_a_conflict() {
        let (store, _dir) = temp_store();
        let repo = RefreshTokenRepository::new(&store);
        repo.insert(&token("a", 1, Duration::days(30))).unwrap();

        let result = repo.insert(&token("a", 2, Duration::days(30)));
        assert!(matches!(result, Err(DbError::Conflict(_))));
        assert_eq!(repo.find("a").unwrap().unwrap().user_id, 1);
    }

    #[test]
    fn rotate_revokes_old_and_stores_new() {
        let (store, _dir) = temp_store();
        let repo = RefreshTokenRepository::new(&store);
        repo.insert(&token("old", 1, Duration::days(30))).unwrap();

        let rotated = repo
            .rotate("old", |t| t.is_active(Utc::now()), |t| token("new", t.user_id, Duration::days(30)))
            .unwrap();
        assert_eq!(rotated.unwrap().id, "new");
        assert!(repo.find("old").unwrap().unwrap().revoked);
        assert!(!repo.find("new").unwrap().unwrap().revoked);

        // A second rotation of the same token is refused and writes nothing
        let again = repo
            .rotate("old", |t| t.is_active(Utc::now()), |_| token("newer", 1, Duration::days(30)))
            .unwrap();
        assert!(again.is_none());
        assert!(repo.find("newer").unwrap().is_none());
    }

    #[test]
    fn rotate_with_colliding_replacement_keeps_old_active() {
        let (store, _dir) = temp_store();
        let repo = RefreshTokenRepository::new(&store);
        repo.insert(&token("old", 1, Duration::days(30))).unwrap();
        repo.insert(&token("taken", 2, Duration::days(30))).unwrap();

        let result = repo.rotate("old", |_| true, |_| token("taken", 1, Duration::days(30)));
        assert!(matches!(result, Err(DbError::Conflict(_))));
        assert!(!repo.find("old").unwrap().unwrap().revoked);
    }

    #[test]
    fn revoke_all_only_touches_that_user() {
        let (store, _dir) = temp_store();
        let repo = RefreshTokenRepository::new(&store);
        repo.insert(&token("u1-a", 1, Duration::days(30))).unwrap();
        repo.insert(&token("u1-b", 1, Duration::days(30))).unwrap();
        repo.insert(&token("u1-expired", 1, Duration::seconds(-5))).unwrap();
        repo.insert(&token("u2-a", 2, Duration::days(30))).unwrap();

        let revoked = repo.revoke_all_for_user(1, Utc::now()).unwrap();
        assert_eq!(revoked, 2);
        assert!(repo.find("u1-a").unwrap().unwrap().revoked);
        assert!(repo.find("u1-b").unwrap().unwrap().revoked);
        assert!(!repo.find("u1-expired").unwrap().unwrap().revoked);
        assert!(!repo.find("u2-a").unwrap().unwrap().revoked);
    }

    #[test]
    fn revoke_single() {
        let (store, _dir) = temp_store();
        let repo = RefreshTokenRepository::new(&store);
        repo.insert(&token("a", 1, Duration::days(30))).unwrap();

        assert!(repo.revoke("a").unwrap());
        assert!(!repo.revoke("a").unwrap());
        assert!(!repo.revoke("missing").unwrap());
    }
}
