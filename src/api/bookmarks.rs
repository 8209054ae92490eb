// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bookmark API endpoints.
//!
//! The first default-sized page of a user's bookmarks is served from
//! [`BookmarkCache`](crate::storage::BookmarkCache); every change to that
//! user's bookmarks drops the cached page.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use super::blogs::blog_page;
use super::validated::{Path, Query};
use crate::{
    auth::Auth,
    error::{ApiError, ErrorEnvelope},
    models::{BlogResponse, BookmarkCheckParams, PageParams, PageResponse, DEFAULT_PAGE_SIZE},
    state::AppState,
    storage::BookmarkRepository,
};

#[utoipa::path(
    post,
    path = "/api/bookmarks/{blogId}",
    tag = "Bookmarks",
    params(("blogId" = u64, Path, description = "Blog to bookmark")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Bookmarked (or already was)"),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 404, description = "Blog not found", body = ErrorEnvelope)
    )
)]
pub async fn add_bookmark(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(blog_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let added = BookmarkRepository::new(&state.store).add(user.user_id, blog_id)?;
    if added {
        state.bookmark_cache.invalidate(user.user_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/bookmarks/{blogId}",
    tag = "Bookmarks",
    params(("blogId" = u64, Path, description = "Blog to forget")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Bookmark removed (or never existed)"),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn remove_bookmark(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(blog_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let removed = BookmarkRepository::new(&state.store).remove(user.user_id, blog_id)?;
    if removed {
        state.bookmark_cache.invalidate(user.user_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/bookmarks/check",
    tag = "Bookmarks",
    params(BookmarkCheckParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Whether the blog is bookmarked", body = bool),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn check_bookmark(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(params): Query<BookmarkCheckParams>,
) -> Result<Json<bool>, ApiError> {
    let exists = BookmarkRepository::new(&state.store).exists(user.user_id, params.blog_id)?;
    Ok(Json(exists))
}

/// Flip the bookmark and return the new state.
#[utoipa::path(
    post,
    path = "/api/bookmarks/{blogId}/toggle",
    tag = "Bookmarks",
    params(("blogId" = u64, Path, description = "Blog to toggle")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "True when now bookmarked", body = bool),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 404, description = "Blog not found", body = ErrorEnvelope)
    )
)]
pub async fn toggle_bookmark(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(blog_id): Path<u64>,
) -> Result<Json<bool>, ApiError> {
    let now_bookmarked = BookmarkRepository::new(&state.store).toggle(user.user_id, blog_id)?;
    state.bookmark_cache.invalidate(user.user_id);
    Ok(Json(now_bookmarked))
}

/// The caller's bookmarked blogs, most recently bookmarked first.
#[utoipa::path(
    get,
    path = "/api/bookmarks",
    tag = "Bookmarks",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Page of bookmarked blogs", body = PageResponse<BlogResponse>),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn list_bookmarks(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(paging): Query<PageParams>,
) -> Result<Json<PageResponse<BlogResponse>>, ApiError> {
    let (index, size) = paging.resolve(DEFAULT_PAGE_SIZE);
    let cacheable = index == 0 && size == DEFAULT_PAGE_SIZE;

    let cached = if cacheable {
        state.bookmark_cache.get_first_page(user.user_id)
    } else {
        None
    };
    let page = match cached {
        Some(page) => {
            tracing::debug!(user_id = user.user_id, "Bookmark page served from cache");
            page
        }
        None => {
            let generation = state.bookmark_cache.generation(user.user_id);
            let page = BookmarkRepository::new(&state.store).list_for_user(user.user_id, index, size)?;
            if cacheable && !state.bookmark_cache.put_first_page(user.user_id, generation, page.clone()) {
                tracing::debug!(user_id = user.user_id, "Bookmarks changed during read; page not cached");
            }
            page
        }
    };

    Ok(Json(blog_page(&state.store, page, index, size)?))
}
