// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Users are keyed by a sequential id. Username and email each have a unique
//! index table; emails are indexed lowercased.

use chrono::{DateTime, Utc};
use redb::{ReadTransaction, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::storage::database::{next_id, USERS, USERS_BY_EMAIL, USERS_BY_USERNAME};
use crate::storage::{DbError, DbResult, Store};

/// User record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    pub id: u64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the service.
    pub password_hash: String,
    pub role: Role,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a user; the id is allocated on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Which unique index a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConflict {
    Username,
    Email,
}

/// Repository for user records.
pub struct UserRepository<'a> {
    store: &'a Store,
}

impl<'a> UserRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new user.
    ///
    /// Username is checked before email. A collision is reported as
    /// `Ok(Err(conflict))` so callers can name the offending field; the
    /// check and the insert share one write transaction.
    pub fn create(&self, user: NewUser) -> DbResult<Result<StoredUser, UserConflict>> {
        self.store.write(|txn| {
            let email_key = user.email.to_lowercase();
            {
                let by_username = txn.open_table(USERS_BY_USERNAME)?;
                if by_username.get(user.username.as_str())?.is_some() {
                    return Ok(Err(UserConflict::Username));
                }
                let by_email = txn.open_table(USERS_BY_EMAIL)?;
                if by_email.get(email_key.as_str())?.is_some() {
                    return Ok(Err(UserConflict::Email));
                }
            }

            let stored = StoredUser {
                id: next_id(txn, "users")?,
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
                password_hash: user.password_hash,
                role: user.role,
                is_blocked: false,
                created_at: Utc::now(),
            };
            put(txn, &stored)?;
            let mut by_username = txn.open_table(USERS_BY_USERNAME)?;
            by_username.insert(stored.username.as_str(), stored.id)?;
            let mut by_email = txn.open_table(USERS_BY_EMAIL)?;
            by_email.insert(email_key.as_str(), stored.id)?;

            tracing::debug!(user_id = stored.id, username = %stored.username, "User created");
            Ok(Ok(stored))
        })
    }

    pub fn find_by_id(&self, id: u64) -> DbResult<Option<StoredUser>> {
        self.store.read(|txn| get(txn, id))
    }

    pub fn find_by_username(&self, username: &str) -> DbResult<Option<StoredUser>> {
        self.store.read(|txn| {
            let index = txn.open_table(USERS_BY_USERNAME)?;
            match index.get(username)? {
                Some(id) => get(txn, id.value()),
                None => Ok(None),
            }
        })
    }

    /// Whether any username equals `username` ignoring case.
    pub fn username_exists_ignoring_case(&self, username: &str) -> DbResult<bool> {
        let wanted = username.to_lowercase();
        self.store.read(|txn| {
            let index = txn.open_table(USERS_BY_USERNAME)?;
            if index.get(username)?.is_some() {
                return Ok(true);
            }
            for entry in index.iter()? {
                let (key, _) = entry?;
                if key.value().to_lowercase() == wanted {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Case-insensitive lookup by email.
    pub fn find_by_email(&self, email: &str) -> DbResult<Option<StoredUser>> {
        let key = email.to_lowercase();
        self.store.read(|txn| {
            let index = txn.open_table(USERS_BY_EMAIL)?;
            match index.get(key.as_str())? {
                Some(id) => get(txn, id.value()),
                None => Ok(None),
            }
        })
    }

    /// Replace the password hash if it still equals `expected_hash`.
    ///
    /// Returns `None` when the password changed in the meantime, so two
    /// resets racing on the same credential cannot both win.
    pub fn replace_password(
        &self,
        id: u64,
        expected_hash: &str,
        new_hash: &str,
    ) -> DbResult<Option<StoredUser>> {
        self.store.write(|txn| {
            let mut user = load_for_update(txn, id)?;
            if user.password_hash != expected_hash {
                return Ok(None);
            }
            user.password_hash = new_hash.to_string();
            put(txn, &user)?;
            Ok(Some(user))
        })
    }

    /// Set the blocked flag of the user with the given username.
    pub fn set_blocked(&self, username: &str, blocked: bool) -> DbResult<StoredUser> {
        let user = self
            .find_by_username(username)?
            .ok_or_else(|| DbError::NotFound(format!("User {username}")))?;
        self.modify(user.id, |user| user.is_blocked = blocked)
    }

    /// Load many users in one transaction, skipping ids that no longer exist.
    pub fn find_many(&self, ids: &[u64]) -> DbResult<Vec<StoredUser>> {
        self.store.read(|txn| {
            let mut users = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(user) = get(txn, *id)? {
                    users.push(user);
                }
            }
            Ok(users)
        })
    }

    fn modify(&self, id: u64, change: impl FnOnce(&mut StoredUser)) -> DbResult<StoredUser> {
        self.store.write(|txn| {
            let mut user = load_for_update(txn, id)?;
            change(&mut user);
            put(txn, &user)?;
            Ok(user)
        })
    }
}

fn load_for_update(txn: &WriteTransaction, id: u64) -> DbResult<StoredUser> {
    let table = txn.open_table(USERS)?;
    let user = match table.get(id)? {
        Some(raw) => serde_json::from_slice::<StoredUser>(raw.value())?,
        None => return Err(DbError::NotFound(format!("User {id}"))),
    };
    Ok(user)
}

fn get(txn: &ReadTransaction, id: u64) -> DbResult<Option<StoredUser>> {
    let table = txn.open_table(USERS)?;
    match table.get(id)? {
        Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
        None => Ok(None),
    }
}

fn put(txn: &WriteTransaction, user: &StoredUser) -> DbResult<()> {
    let bytes = serde_json::to_vec(user)?;
    let mut table = txn.open_table(USERS)?;
    table.insert(user.id, bytes.as_slice())?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;

    pub(crate) fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn create_and_find() {
        let (store, _dir) = temp_store();
        let repo = UserRepository::new(&store);

        let user = repo.create(new_user("ada", "Ada@Example.com")).unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert!(!user.is_blocked);

        assert_eq!(repo.find_by_id(1).unwrap().unwrap().username, "ada");
        assert_eq!(repo.find_by_username("ada").unwrap().unwrap().id, 1);
        assert_eq!(repo.find_by_email("ada@example.COM").unwrap().unwrap().id, 1);
        assert!(repo.find_by_username("bob").unwrap().is_none());

        assert!(repo.username_exists_ignoring_case("ADA").unwrap());
        assert!(!repo.username_exists_ignoring_case("bob").unwrap());
    }

    #[test]
    fn username_conflict_is_reported_before_email() {
        let (store, _dir) = temp_store();
        let repo = UserRepository::new(&store);
        repo.create(new_user("ada", "ada@example.com")).unwrap().unwrap();

        let both = repo.create(new_user("ada", "ada@example.com")).unwrap();
        assert_eq!(both, Err(UserConflict::Username));

        let email_only = repo.create(new_user("grace", "ADA@example.com")).unwrap();
        assert_eq!(email_only, Err(UserConflict::Email));
    }

    #[test]
    fn block_and_password_updates_persist() {
        let (store, _dir) = temp_store();
        let repo = UserRepository::new(&store);
        let user = repo.create(new_user("ada", "ada@example.com")).unwrap().unwrap();

        let blocked = repo.set_blocked("ada", true).unwrap();
        assert!(blocked.is_blocked);
        let replaced = repo
            .replace_password(user.id, "$argon2id$placeholder", "$argon2id$new")
            .unwrap();
        assert!(replaced.is_some());
        // Stale expectation loses
        assert!(repo
            .replace_password(user.id, "$argon2id$placeholder", "$argon2id$other")
            .unwrap()
            .is_none());

        let reloaded = repo.find_by_id(user.id).unwrap().unwrap();
        assert!(reloaded.is_blocked);
        assert_eq!(reloaded.password_hash, "$argon2id$new");

        assert!(matches!(repo.set_blocked("nobody", true), Err(DbError::NotFound(_))));
    }
}
