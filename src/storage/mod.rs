// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single redb file (`<data_dir>/blog.redb`).
//! All access goes through [`Store`], which wraps every transaction in a
//! [`CircuitBreaker`]. The request pipeline reads the same breaker to turn
//! away traffic while the database is failing.
//!
//! ## Layout
//!
//! ```text
//! storage/
//!   database.rs        # Store, DbError, table definitions
//!   circuit_breaker.rs # CLOSED / OPEN / HALF_OPEN / FORCED_OPEN
//!   repository/        # users, refresh tokens, blogs, bookmarks, comments
//!   audit.rs           # append-only audit trail
//!   bookmark_cache.rs  # LRU of each user's first bookmark page
//! ```

pub mod audit;
pub mod bookmark_cache;
pub mod circuit_breaker;
pub mod database;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditQuery, AuditRepository};
pub use bookmark_cache::BookmarkCache;
pub use circuit_breaker::{BreakerState, BreakerUnavailable, CircuitBreaker, CircuitBreakerConfig};
pub use database::{DbError, DbResult, Store};
pub use repository::{
    BlogFilter, BlogRepository, BookmarkRepository, CommentRepository, NewBlog, NewUser, Page,
    RefreshTokenRepository, StoredBlog, StoredComment, StoredRefreshToken, StoredUser,
    UserConflict, UserRepository,
};
