// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public account and session endpoints.
//!
//! Password hashing is CPU-bound, so service calls run on the blocking
//! pool rather than on the async workers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::validated::Valid;
use crate::auth::{AuthError, AuthService};
use crate::error::{ApiError, ErrorEnvelope};
use crate::models::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, TokenPairResponse,
};
use crate::state::AppState;

async fn run_blocking<T, F>(auth: Arc<AuthService>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AuthService) -> Result<T, AuthError> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || op(&auth)).await;
    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "Auth task failed to complete");
            Err(ApiError::internal())
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = TokenPairResponse),
        (status = 400, description = "Validation failed or username/email taken", body = ErrorEnvelope),
        (status = 429, description = "Rate limit exceeded", body = ErrorEnvelope)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Valid(request): Valid<RegisterRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = run_blocking(state.auth.clone(), move |auth| auth.register(&request)).await?;
    Ok(Json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenPairResponse),
        (status = 401, description = "Bad credentials", body = ErrorEnvelope)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Valid(request): Valid<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = run_blocking(state.auth.clone(), move |auth| auth.login(&request)).await?;
    Ok(Json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = MessageResponse),
        (status = 404, description = "No account with that email", body = ErrorEnvelope)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Valid(request): Valid<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = run_blocking(state.auth.clone(), move |auth| auth.forgot_password(&request)).await?;
    Ok(Json(message))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed, all sessions revoked", body = MessageResponse),
        (status = 401, description = "Reset token invalid, expired or already used", body = ErrorEnvelope)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Valid(request): Valid<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = run_blocking(state.auth.clone(), move |auth| auth.reset_password(&request)).await?;
    Ok(Json(message))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPairResponse),
        (status = 401, description = "Refresh token invalid, expired or revoked", body = ErrorEnvelope)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Valid(request): Valid<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = run_blocking(state.auth.clone(), move |auth| auth.refresh(&request.refresh_token)).await?;
    Ok(Json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Refresh token revoked (or was already unusable)")
    )
)]
pub async fn logout(State(state): State<AppState>, Valid(request): Valid<RefreshRequest>) -> StatusCode {
    // Always 204; an unrevoked token still expires at its deadline
    if let Err(e) = run_blocking(state.auth.clone(), move |auth| auth.logout(&request.refresh_token)).await {
        tracing::warn!(status = %e.status, error = %e.message, "Logout could not revoke refresh token");
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::service::tests::register_request;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn logout_revokes_the_refresh_token() {
        let (state, _dir) = test_state();
        let pair = state.auth.register(&register_request("ada", "ada@example.com")).unwrap();

        let status = logout(
            State(state.clone()),
            Valid(RefreshRequest {
                refresh_token: pair.refresh_token.clone(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(matches!(
            state.auth.refresh(&pair.refresh_token),
            Err(AuthError::InvalidRefreshToken(_))
        ));
    }

    #[tokio::test]
    async fn logout_succeeds_while_storage_is_down() {
        let (state, _dir) = test_state();
        let pair = state.auth.register(&register_request("ada", "ada@example.com")).unwrap();
        state.store.breaker().force_open();

        let status = logout(
            State(state.clone()),
            Valid(RefreshRequest {
                refresh_token: pair.refresh_token,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
