// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Comment API endpoints.
//!
//! Only the author of a comment or an admin may change or delete it.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use super::validated::{Path, Query, Valid};
use crate::{
    auth::{AuthenticatedUser, Auth},
    error::{ApiError, ErrorEnvelope},
    models::{
        CommentResponse, CreateCommentRequest, PageParams, PageResponse, UpdateCommentRequest,
        DEFAULT_COMMENT_PAGE_SIZE,
    },
    state::AppState,
    storage::{CommentRepository, StoredComment, Store},
};

const NOT_COMMENT_OWNER: &str = "You don't have permission to modify this comment";

/// Load a comment the caller may modify.
fn owned_comment(store: &Store, user: &AuthenticatedUser, id: u64) -> Result<StoredComment, ApiError> {
    let comment = CommentRepository::new(store)
        .get(id)?
        .ok_or_else(|| ApiError::not_found(format!("Comment {id} not found")))?;
    if comment.author_id != user.user_id && !user.is_admin() {
        tracing::warn!(comment_id = id, user_id = user.user_id, "Comment change refused");
        return Err(ApiError::forbidden(NOT_COMMENT_OWNER));
    }
    Ok(comment)
}

#[utoipa::path(
    post,
    path = "/api/comments/create",
    tag = "Comments",
    request_body = CreateCommentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Created comment", body = CommentResponse),
        (status = 400, description = "Validation failed", body = ErrorEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn create_comment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Valid(request): Valid<CreateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = CommentRepository::new(&state.store).create(&request.content, user.user_id, &user.username)?;
    Ok(Json(CommentResponse::from(comment)))
}

/// All comments in id order.
#[utoipa::path(
    get,
    path = "/api/comments/listAll",
    tag = "Comments",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Page of comments", body = PageResponse<CommentResponse>),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope)
    )
)]
pub async fn list_comments(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(paging): Query<PageParams>,
) -> Result<Json<PageResponse<CommentResponse>>, ApiError> {
    let (index, size) = paging.resolve(DEFAULT_COMMENT_PAGE_SIZE);
    let page = CommentRepository::new(&state.store).list(index, size)?;
    Ok(Json(PageResponse::from_page(page, index, size, CommentResponse::from)))
}

#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    tag = "Comments",
    params(("id" = u64, Path, description = "Comment id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 403, description = "Not the author", body = ErrorEnvelope),
        (status = 404, description = "Comment not found", body = ErrorEnvelope)
    )
)]
pub async fn delete_comment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    owned_comment(&state.store, &user, id)?;
    CommentRepository::new(&state.store).delete(id)?;
    tracing::info!(comment_id = id, user_id = user.user_id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Partial update; an absent `content` leaves the comment as it is.
#[utoipa::path(
    patch,
    path = "/api/comments/{id}",
    tag = "Comments",
    params(("id" = u64, Path, description = "Comment id")),
    request_body = UpdateCommentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated comment", body = CommentResponse),
        (status = 400, description = "Validation failed", body = ErrorEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 403, description = "Not the author", body = ErrorEnvelope),
        (status = 404, description = "Comment not found", body = ErrorEnvelope)
    )
)]
pub async fn update_comment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Valid(request): Valid<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = owned_comment(&state.store, &user, id)?;
    let comment = match request.content {
        Some(content) => CommentRepository::new(&state.store).update_content(id, &content)?,
        None => comment,
    };
    Ok(Json(CommentResponse::from(comment)))
}
