// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive serde and
//! `ToSchema`; request bodies also derive `Validate`, and the
//! [`Valid`](crate::api::validated::Valid) extractor turns violations into a
//! 400 with per-field messages.
//!
//! JSON field names are camelCase throughout.
//!
//! ## Model Categories
//!
//! - **Auth**: registration, login, password reset, token refresh
//! - **Admin**: blocking users
//! - **Blogs**: creation, listing, filtering
//! - **Comments**: creation and editing
//! - **Paging**: the shared page envelope and query parameters

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::storage::{BlogFilter, Page, StoredBlog, StoredComment, StoredUser};

/// Default page size for blog and bookmark listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default page size for comment listings.
pub const DEFAULT_COMMENT_PAGE_SIZE: usize = 10;

/// Upper bound on any requested page size.
pub const MAX_PAGE_SIZE: usize = 100;

// =============================================================================
// Validation helpers
// =============================================================================

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn valid_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty() || t.chars().count() > 64) {
        let mut error = ValidationError::new("tags");
        error.message = Some(Cow::from("Each tag must be between 1 and 64 characters"));
        return Err(error);
    }
    Ok(())
}

// =============================================================================
// Auth Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom(function = "not_blank", message = "First name is required"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank", message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "Email should be valid"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(custom(function = "not_blank", message = "Username is required"))]
    pub username: String,
    #[validate(custom(function = "not_blank", message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Email should be valid"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "not_blank", message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Body of `/auth/refresh` and `/auth/logout`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(custom(function = "not_blank", message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Access token plus the refresh token paired with it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Admin Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockUserRequest {
    #[validate(custom(function = "not_blank", message = "Username is required"))]
    pub username: String,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockUserResponse {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub is_blocked: bool,
}

impl From<StoredUser> for BlockUserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            is_blocked: user.is_blocked,
        }
    }
}

/// Query parameters of the audit log endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogParams {
    /// Maximum number of events (default 100, max 1000)
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Filter by event type (snake_case, e.g. `login_failed`)
    pub event_type: Option<String>,
    pub user_id: Option<u64>,
}

// =============================================================================
// Blog Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBlogRequest {
    #[validate(length(min = 5, max = 150, message = "Title must be between 5 and 150 characters"))]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
}

/// Public view of a blog author.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: u64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl AuthorSummary {
    /// Summary from the full user record, or from the blog's denormalized
    /// username when that record is gone.
    pub fn for_blog(blog: &StoredBlog, author: Option<&StoredUser>) -> Self {
        match author {
            Some(user) => Self {
                id: user.id,
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            },
            None => Self {
                id: blog.author_id,
                username: blog.author_username.clone(),
                first_name: String::new(),
                last_name: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlogResponse {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

impl BlogResponse {
    pub fn new(blog: StoredBlog, author: AuthorSummary) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            content: blog.content,
            tags: blog.tags,
            created_at: blog.created_at,
            updated_at: blog.updated_at,
            author,
        }
    }
}

/// Query parameters of `GET /blogs/filter`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BlogFilterParams {
    /// Comma-separated tags; a blog matches if it has any of them
    pub tags: Option<String>,
    /// Author username (case-insensitive)
    pub author: Option<String>,
    /// Inclusive lower bound on creation time (RFC 3339)
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time (RFC 3339)
    pub created_to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the title
    pub q: Option<String>,
    /// Accepted for compatibility; blogs have no publication state
    pub only_published: Option<bool>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl BlogFilterParams {
    pub fn filter(&self) -> BlogFilter {
        BlogFilter {
            tags: self
                .tags
                .as_deref()
                .map(|raw| {
                    raw.split(',')
                        .map(|t| t.trim().to_lowercase())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            author: non_empty(self.author.as_deref()),
            created_from: self.created_from,
            created_to: self.created_to,
            title_query: non_empty(self.q.as_deref()),
        }
    }

    pub fn paging(&self) -> PageParams {
        PageParams {
            page: self.page,
            size: self.size,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

// =============================================================================
// Bookmark Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookmarkCheckParams {
    pub blog_id: u64,
}

// =============================================================================
// Comment Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(custom(function = "not_blank", message = "Content is required"))]
    pub content: String,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(custom(function = "not_blank", message = "Content must not be blank"))]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CommentResponse {
    pub id: u64,
    pub content: String,
    pub username: String,
}

impl From<StoredComment> for CommentResponse {
    fn from(comment: StoredComment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            username: comment.author_username,
        }
    }
}

// =============================================================================
// Paging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Zero-based page index
    pub page: Option<usize>,
    /// Page size (capped at 100)
    pub size: Option<usize>,
}

impl PageParams {
    /// Resolve to `(page, size)` with the given default size.
    pub fn resolve(&self, default_size: usize) -> (usize, usize) {
        let size = self.size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
        (self.page.unwrap_or(0), size)
    }
}

/// Page envelope shared by every listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> PageResponse<T> {
    pub fn from_page<S>(page: Page<S>, index: usize, size: usize, map: impl FnMut(S) -> T) -> Self {
        Self {
            content: page.items.into_iter().map(map).collect(),
            page: index,
            size,
            total_elements: page.total,
            total_pages: page.total.div_ceil(size.max(1)),
        }
    }
}
