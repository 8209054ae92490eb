// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Blocking and unblocking user accounts
//! - Audit log queries

use axum::{
    extract::State,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::validated::{Query, Valid};
use crate::{
    audit_log,
    auth::AdminOnly,
    error::{ApiError, ErrorEnvelope},
    models::{AuditLogParams, BlockUserRequest, BlockUserResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditQuery, AuditRepository, DbError, UserRepository},
};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    /// Audit events matching the query, newest first.
    pub events: Vec<AuditEvent>,
    /// Whether more events exist past this page.
    pub has_more: bool,
}

/// Block or unblock a user.
///
/// A block takes effect on the user's next request, including requests made
/// with tokens issued before the block.
#[utoipa::path(
    post,
    path = "/admin/block-user",
    tag = "Admin",
    request_body = BlockUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated user", body = BlockUserResponse),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 403, description = "Not authorized (admin required)", body = ErrorEnvelope),
        (status = 404, description = "User not found", body = ErrorEnvelope)
    )
)]
pub async fn block_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Valid(request): Valid<BlockUserRequest>,
) -> Result<Json<BlockUserResponse>, ApiError> {
    let user = UserRepository::new(&state.store)
        .set_blocked(&request.username, request.is_blocked)
        .map_err(|e| match e {
            DbError::NotFound(_) => ApiError::not_found("User not found"),
            other => ApiError::from(other),
        })?;

    let event_type = if user.is_blocked {
        AuditEventType::UserBlocked
    } else {
        AuditEventType::UserUnblocked
    };
    audit_log!(
        &state.store,
        AuditEvent::new(event_type)
            .with_user(admin.user_id, &admin.username)
            .with_resource("user", user.id.to_string())
    );
    tracing::info!(
        admin_id = admin.user_id,
        user_id = user.id,
        blocked = user.is_blocked,
        "User block flag changed"
    );

    Ok(Json(BlockUserResponse::from(user)))
}

/// Query audit logs.
///
/// Filter by event type and user id. Admin only.
#[utoipa::path(
    get,
    path = "/admin/audit",
    tag = "Admin",
    params(AuditLogParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters", body = ErrorEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
        (status = 403, description = "Not authorized (admin required)", body = ErrorEnvelope)
    )
)]
pub async fn query_audit_logs(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let event_type = match params.event_type.as_deref() {
        Some(raw) => Some(
            serde_json::from_value::<AuditEventType>(serde_json::Value::String(raw.to_string()))
                .map_err(|_| ApiError::bad_request(format!("Unknown event type: {raw}")))?,
        ),
        None => None,
    };
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);

    // One extra row tells us whether another page exists
    let mut events = AuditRepository::new(&state.store).query(&AuditQuery {
        limit: limit + 1,
        offset: params.offset.unwrap_or(0),
        event_type,
        user_id: params.user_id,
    })?;
    let has_more = events.len() > limit;
    events.truncate(limit);

    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::AdminAccess)
            .with_user(admin.user_id, &admin.username)
            .with_resource("audit_log", "query")
    );

    Ok(Json(AuditLogResponse { events, has_more }))
}
