// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the request principal.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! The JWT gate normally resolves the principal and leaves a
//! [`RequestContext`] in the request extensions. When no principal is there
//! the Authorization header is decoded again, only to report why the request
//! is unauthenticated.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser, RequestContext, TokenCodec};
use crate::state::AppState;

/// Extractor for authenticated users. Rejects with 401.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if the gate already resolved the user
        if let Some(user) = parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.principal.clone())
        {
            return Ok(Auth(user));
        }

        let user = authenticate_header(parts, &state.tokens)?;
        Ok(Auth(user))
    }
}

/// Decode the bearer token of `parts`, classifying any failure.
fn authenticate_header(parts: &Parts, tokens: &TokenCodec) -> Result<AuthenticatedUser, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = tokens.decode_access(token)?;
    Ok(AuthenticatedUser::from_claims(claims))
}

/// Extractor that requires the ADMIN role.
///
/// 401 without a principal, 403 with a non-admin one.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::debug!(user_id = user.user_id, "Admin route refused");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::tests::test_state;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn user(roles: Vec<Role>) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: 1,
            username: "ada".to_string(),
            roles,
            expires_at: 0,
        }
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_classifies_bad_headers() {
        let (state, _temp_dir) = test_state();

        let mut basic = parts(Some("Basic abc"));
        let result = Auth::from_request_parts(&mut basic, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));

        let mut garbage = parts(Some("Bearer not-a-jwt"));
        let result = Auth::from_request_parts(&mut garbage, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn auth_extractor_decodes_a_valid_token() {
        let (state, _temp_dir) = test_state();
        let token = state.tokens.issue_access(9, "grace", &[Role::User]).unwrap();
        let mut parts = parts(Some(&format!("Bearer {token}")));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, 9);
        assert_eq!(user.username, "grace");
    }

    #[tokio::test]
    async fn auth_extractor_prefers_request_context() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts(None);
        parts
            .extensions
            .insert(RequestContext::authenticated(user(vec![Role::User])));

        let Auth(found) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(found.username, "ada");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts(None);
        parts
            .extensions
            .insert(RequestContext::authenticated(user(vec![Role::User])));

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts(None);
        parts
            .extensions
            .insert(RequestContext::authenticated(user(vec![Role::Admin])));

        assert!(AdminOnly::from_request_parts(&mut parts, &state).await.is_ok());
    }
}
