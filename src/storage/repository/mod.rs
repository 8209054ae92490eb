// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the embedded database.
//!
//! Each repository borrows the [`Store`](super::Store) and exposes the
//! operations of one entity type. Multi-step changes run inside a single
//! write transaction.

pub mod blogs;
pub mod bookmarks;
pub mod comments;
pub mod refresh_tokens;
pub mod users;

pub use blogs::{normalize_tags, BlogFilter, BlogRepository, NewBlog, Page, StoredBlog};
pub use bookmarks::BookmarkRepository;
pub use comments::{CommentRepository, StoredComment};
pub use refresh_tokens::{RefreshTokenRepository, StoredRefreshToken};
pub use users::{NewUser, StoredUser, UserConflict, UserRepository};
