// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blog API endpoints.
//!
//! Every route needs an authenticated principal. Listings are newest first.

use std::collections::HashMap;

use axum::{
    extract::State,
    Json,
};

use super::validated::{Path, Query, Valid};
use crate::{
    auth::{Auth, AuthError},
    error::{ApiError, ErrorEnvelope},
    models::{
        AuthorSummary, BlogFilterParams, BlogResponse, CreateBlogRequest, PageParams, PageResponse,
        DEFAULT_PAGE_SIZE,
    },
    state::AppState,
    storage::{BlogFilter, BlogRepository, NewBlog, Page, StoredBlog, StoredUser, Store, UserRepository},
};

/// Run a blog query and attach author summaries.
pub(crate) fn blog_page(
    store: &Store,
    page: Page<StoredBlog>,
    index: usize,
    size: usize,
) -> Result<PageResponse<BlogResponse>, ApiError> {
    let mut ids: Vec<u64> = page.items.iter().map(|b| b.author_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let authors: HashMap<u64, StoredUser> = UserRepository::new(store)
        .find_many(&ids)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(PageResponse::from_page(page, index, size, |blog| {
        let author = AuthorSummary::for_blog(&blog, authors.get(&blog.author_id));
        BlogResponse::new(blog, author)
    }))
}

fn filtered(
    state: &AppState,
    filter: &BlogFilter,
    paging: PageParams,
) -> Result<PageResponse<BlogResponse>, ApiError> {
    let (index, size) = paging.resolve(DEFAULT_PAGE_SIZE);
    let page = BlogRepository::new(&state.store).list(filter, index, size)?;
    blog_page(&state.store, page, index, size)
}

/// List all blogs.
#[utoipa::path(
    get,
    path = "/blogs",
    tag = "Blogs",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Page of blogs", body = PageResponse<BlogResponse>),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn list_blogs(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(paging): Query<PageParams>,
) -> Result<Json<PageResponse<BlogResponse>>, ApiError> {
    Ok(Json(filtered(&state, &BlogFilter::default(), paging)?))
}

#[utoipa::path(
    get,
    path = "/blogs/{id}",
    tag = "Blogs",
    params(("id" = u64, Path, description = "Blog id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The blog", body = BlogResponse),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 404, description = "Blog not found", body = ErrorEnvelope)
    )
)]
pub async fn get_blog(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = BlogRepository::new(&state.store)
        .get(id)?
        .ok_or_else(|| ApiError::not_found(format!("Blog {id} not found")))?;
    let author = UserRepository::new(&state.store).find_by_id(blog.author_id)?;
    let summary = AuthorSummary::for_blog(&blog, author.as_ref());
    Ok(Json(BlogResponse::new(blog, summary)))
}

/// Blogs written by one author. The username match ignores case.
#[utoipa::path(
    get,
    path = "/blogs/author/{username}",
    tag = "Blogs",
    params(("username" = String, Path, description = "Author username"), PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Page of blogs", body = PageResponse<BlogResponse>),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 404, description = "No such user", body = ErrorEnvelope)
    )
)]
pub async fn list_by_author(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(paging): Query<PageParams>,
) -> Result<Json<PageResponse<BlogResponse>>, ApiError> {
    if !UserRepository::new(&state.store).username_exists_ignoring_case(&username)? {
        return Err(AuthError::UsernameNotFound(username).into());
    }
    let filter = BlogFilter {
        author: Some(username),
        ..BlogFilter::default()
    };
    Ok(Json(filtered(&state, &filter, paging)?))
}

/// Publish a blog as the calling user.
#[utoipa::path(
    post,
    path = "/blogs",
    tag = "Blogs",
    request_body = CreateBlogRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Created blog", body = BlogResponse),
        (status = 400, description = "Validation failed", body = ErrorEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn create_blog(
    Auth(user): Auth,
    State(state): State<AppState>,
    Valid(request): Valid<CreateBlogRequest>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = BlogRepository::new(&state.store).create(NewBlog {
        title: request.title.trim().to_string(),
        content: request.content,
        tags: request.tags.unwrap_or_default(),
        author_id: user.user_id,
        author_username: user.username,
    })?;
    tracing::info!(blog_id = blog.id, author_id = blog.author_id, "Blog published");

    let author = UserRepository::new(&state.store).find_by_id(blog.author_id)?;
    let summary = AuthorSummary::for_blog(&blog, author.as_ref());
    Ok(Json(BlogResponse::new(blog, summary)))
}

/// Search blogs. All given filters must match.
#[utoipa::path(
    get,
    path = "/blogs/filter",
    tag = "Blogs",
    params(BlogFilterParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Page of matching blogs", body = PageResponse<BlogResponse>),
        (status = 400, description = "Malformed query", body = ErrorEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn filter_blogs(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(params): Query<BlogFilterParams>,
) -> Result<Json<PageResponse<BlogResponse>>, ApiError> {
    Ok(Json(filtered(&state, &params.filter(), params.paging())?))
}
