// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolves the bearer token into a [`RequestContext`].
//!
//! Never rejects. A missing, malformed or expired token leaves the request
//! anonymous and the route's extractor decides whether that is acceptable.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthenticatedUser, RequestContext, TokenCodec};
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Principal named by the Authorization header, if it carries a valid
/// access token.
pub fn resolve_principal(tokens: &TokenCodec, headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)?;

    match tokens.decode_access(token) {
        Ok(claims) => Some(AuthenticatedUser::from_claims(claims)),
        Err(e) => {
            tracing::debug!(error_code = e.error_code(), "Ignoring invalid bearer token");
            None
        }
    }
}

pub async fn jwt_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let already_authenticated = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|ctx| ctx.principal.is_some());

    if !already_authenticated {
        let context = match resolve_principal(&state.tokens, request.headers()) {
            Some(user) => RequestContext::authenticated(user),
            None => RequestContext::anonymous(),
        };
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}
