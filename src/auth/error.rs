// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::storage::DbError;

/// Authentication error type.
///
/// Covers bearer-token failures seen by the extractors and the typed
/// failures of the auth service.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed or of the wrong kind
    MalformedToken,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Insufficient permissions
    InsufficientPermissions,
    /// Registration with a taken username
    UsernameTaken(String),
    /// Registration with a taken email
    EmailTaken(String),
    /// Username/password did not match
    BadCredentials,
    UsernameNotFound(String),
    EmailNotFound(String),
    /// Refresh token malformed, unknown, revoked, expired or mismatched
    InvalidRefreshToken(String),
    /// Reset token invalid, expired or already used
    InvalidResetToken,
    /// Storage failed underneath an auth operation
    Storage(DbError),
    /// Internal error
    InternalError(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::UsernameTaken(_) => "username_taken",
            AuthError::EmailTaken(_) => "email_taken",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::UsernameNotFound(_) | AuthError::EmailNotFound(_) => "user_not_found",
            AuthError::InvalidRefreshToken(_) => "invalid_refresh_token",
            AuthError::InvalidResetToken => "invalid_reset_token",
            AuthError::Storage(DbError::Unavailable) => "storage_unavailable",
            AuthError::Storage(_) => "storage_error",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::BadCredentials
            | AuthError::InvalidRefreshToken(_)
            | AuthError::InvalidResetToken => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::UsernameTaken(_) | AuthError::EmailTaken(_) => StatusCode::BAD_REQUEST,
            AuthError::UsernameNotFound(_) | AuthError::EmailNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Storage(DbError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Storage(_) | AuthError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::UsernameTaken(u) => write!(f, "User with username {u} already exists"),
            AuthError::EmailTaken(e) => write!(f, "User with email {e} already exists"),
            AuthError::BadCredentials => write!(f, "Bad credentials"),
            AuthError::UsernameNotFound(u) => write!(f, "User with username {u} not found"),
            AuthError::EmailNotFound(e) => write!(f, "User with email {e} not found"),
            AuthError::InvalidRefreshToken(t) => write!(f, "Refresh token {t} not valid"),
            AuthError::InvalidResetToken => write!(f, "Password reset token is invalid or expired"),
            AuthError::Storage(e) => write!(f, "Storage error: {e}"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        AuthError::Storage(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match &e {
            AuthError::Storage(DbError::Unavailable) => ApiError::service_unavailable(),
            AuthError::Storage(_) | AuthError::InternalError(_) => {
                tracing::error!(error = %e, error_code = e.error_code(), "Auth operation failed");
                ApiError::internal()
            }
            _ => ApiError::new(e.status_code(), e.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(error_code = self.error_code(), "Auth request rejected");
        ApiError::from(self).into_response()
    }
}
