// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user id → serialized StoredUser
//! - `users_by_username`: username → user id
//! - `users_by_email`: lowercase email → user id
//! - `refresh_tokens`: token id (UUID) → serialized StoredRefreshToken
//! - `refresh_tokens_by_user`: (user id, token id) → ()
//! - `blogs`: blog id → serialized StoredBlog
//! - `tags`: tag name → ()
//! - `bookmarks`: (user id, blog id) → created-at (unix micros)
//! - `comments`: comment id → serialized StoredComment
//! - `sequences`: sequence name → last issued id
//! - `audit_log`: (unix micros, event id) → serialized AuditEvent
//!
//! Every transaction goes through the [`CircuitBreaker`]: while it is open,
//! calls fail fast with [`DbError::Unavailable`].

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::circuit_breaker::CircuitBreaker;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
pub(crate) const USERS_BY_USERNAME: TableDefinition<&str, u64> = TableDefinition::new("users_by_username");
pub(crate) const USERS_BY_EMAIL: TableDefinition<&str, u64> = TableDefinition::new("users_by_email");
pub(crate) const REFRESH_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("refresh_tokens");
pub(crate) const REFRESH_TOKENS_BY_USER: TableDefinition<(u64, &str), ()> =
    TableDefinition::new("refresh_tokens_by_user");
pub(crate) const BLOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("blogs");
pub(crate) const TAGS: TableDefinition<&str, ()> = TableDefinition::new("tags");
pub(crate) const BOOKMARKS: TableDefinition<(u64, u64), i64> = TableDefinition::new("bookmarks");
pub(crate) const COMMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("comments");
pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
pub(crate) const AUDIT_LOG: TableDefinition<(i64, &str), &[u8]> = TableDefinition::new("audit_log");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("storage unavailable (circuit breaker open)")]
    Unavailable,
}

impl DbError {
    /// Whether this error says something about the health of the database
    /// itself, as opposed to the data in it.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            DbError::Redb(_)
                | DbError::RedbDatabase(_)
                | DbError::RedbTransaction(_)
                | DbError::RedbTable(_)
                | DbError::RedbStorage(_)
                | DbError::RedbCommit(_)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Store
// =============================================================================

/// Embedded ACID store shared by all repositories.
pub struct Store {
    db: Database,
    breaker: Arc<CircuitBreaker>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, breaker: Arc<CircuitBreaker>) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "Could not create data directory");
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(USERS)?;
            write_txn.open_table(USERS_BY_USERNAME)?;
            write_txn.open_table(USERS_BY_EMAIL)?;
            write_txn.open_table(REFRESH_TOKENS)?;
            write_txn.open_table(REFRESH_TOKENS_BY_USER)?;
            write_txn.open_table(BLOGS)?;
            write_txn.open_table(TAGS)?;
            write_txn.open_table(BOOKMARKS)?;
            write_txn.open_table(COMMENTS)?;
            write_txn.open_table(SEQUENCES)?;
            write_txn.open_table(AUDIT_LOG)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Database opened");
        Ok(Self { db, breaker })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `f` inside a read transaction.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> DbResult<T>) -> DbResult<T> {
        self.guarded(|| {
            let txn = self.db.begin_read()?;
            f(&txn)
        })
    }

    /// Run `f` inside a write transaction, committing only if it succeeds.
    ///
    /// redb admits one writer at a time, so everything `f` reads and writes
    /// happens atomically with respect to other writers.
    pub fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> DbResult<T>) -> DbResult<T> {
        self.guarded(|| {
            let txn = self.db.begin_write()?;
            let out = f(&txn)?;
            txn.commit()?;
            Ok(out)
        })
    }

    /// Probe the database directly, bypassing the breaker.
    pub fn ping(&self) -> DbResult<()> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SEQUENCES)?;
        table.get("users")?;
        Ok(())
    }

    fn guarded<T>(&self, op: impl FnOnce() -> DbResult<T>) -> DbResult<T> {
        if !self.breaker.try_acquire() {
            return Err(DbError::Unavailable);
        }
        let result = op();
        match &result {
            Err(e) if e.is_infrastructure() => {
                tracing::error!(error = %e, "Storage operation failed");
                self.breaker.record_failure();
            }
            _ => self.breaker.record_success(),
        }
        result
    }
}

/// Allocate the next id of a named sequence inside a write transaction.
pub(crate) fn next_id(txn: &WriteTransaction, sequence: &str) -> DbResult<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let next = table.get(sequence)?.map(|v| v.value()).unwrap_or(0) + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::circuit_breaker::{BreakerState, CircuitBreakerConfig};

    /// Open a fresh store in a temp directory.
    pub(crate) fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let store = Store::open(&dir.path().join("test.redb"), breaker).unwrap();
        (store, dir)
    }

    #[test]
    fn sequences_are_monotonic_per_name() {
        let (store, _dir) = temp_store();
        let ids = store
            .write(|txn| {
                Ok((
                    next_id(txn, "blogs")?,
                    next_id(txn, "blogs")?,
                    next_id(txn, "comments")?,
                ))
            })
            .unwrap();
        assert_eq!(ids, (1, 2, 1));
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let (store, _dir) = temp_store();
        let result: DbResult<()> = store.write(|txn| {
            next_id(txn, "blogs")?;
            Err(DbError::Conflict("boom".into()))
        });
        assert!(matches!(result, Err(DbError::Conflict(_))));

        let next = store.write(|txn| next_id(txn, "blogs")).unwrap();
        assert_eq!(next, 1);
    }

    #[test]
    fn open_breaker_fails_fast() {
        let (store, _dir) = temp_store();
        store.breaker().force_open();

        let result = store.read(|_| Ok(()));
        assert!(matches!(result, Err(DbError::Unavailable)));
        assert_eq!(store.breaker().state().unwrap(), BreakerState::ForcedOpen);

        // The probe still reaches the database
        assert!(store.ping().is_ok());
    }

    #[test]
    fn data_errors_do_not_trip_the_breaker() {
        let (store, _dir) = temp_store();
        for _ in 0..10 {
            let _ = store.read(|_| -> DbResult<()> { Err(DbError::NotFound("x".into())) });
        }
        assert_eq!(store.breaker().state().unwrap(), BreakerState::Closed);
    }
}
