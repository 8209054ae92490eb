// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refuses authenticated requests from blocked accounts.
//!
//! The flag is read from the live user record on every request, so a block
//! takes effect immediately even for tokens issued before it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{fail_open, Decision, Denial, InfraError};
use crate::auth::RequestContext;
use crate::state::AppState;
use crate::storage::{Store, UserRepository};

pub fn check(store: &Store, context: Option<&RequestContext>) -> Result<Decision, InfraError> {
    let Some(principal) = context.and_then(|ctx| ctx.principal.as_ref()) else {
        return Ok(Decision::Proceed);
    };

    // A vanished account is left to the route's own authorization.
    match UserRepository::new(store).find_by_username(&principal.username)? {
        Some(user) if user.is_blocked => {
            tracing::debug!(user_id = user.id, "Rejecting request from blocked user");
            Ok(Decision::Deny(Denial::UserBlocked))
        }
        _ => Ok(Decision::Proceed),
    }
}

pub async fn blocked_user_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let decision = fail_open(
        "blocked_user",
        check(&state.store, request.extensions().get::<RequestContext>()),
    );
    match decision {
        Decision::Proceed => next.run(request).await,
        Decision::Deny(denial) => denial.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, Role};
    use crate::storage::database::tests::temp_store;
    use crate::storage::repository::users::tests::new_user;

    fn context(username: &str) -> RequestContext {
        RequestContext::authenticated(AuthenticatedUser {
            user_id: 1,
            username: username.to_string(),
            roles: vec![Role::User],
            expires_at: 0,
        })
    }

    #[test]
    fn anonymous_requests_proceed_without_lookup() {
        let (store, _dir) = temp_store();
        store.breaker().force_open();
        assert_eq!(check(&store, None).unwrap(), Decision::Proceed);
        assert_eq!(
            check(&store, Some(&RequestContext::anonymous())).unwrap(),
            Decision::Proceed
        );
    }

    #[test]
    fn blocked_user_is_denied() {
        let (store, _dir) = temp_store();
        let users = UserRepository::new(&store);
        users.create(new_user("ada", "ada@example.com")).unwrap().unwrap();

        assert_eq!(check(&store, Some(&context("ada"))).unwrap(), Decision::Proceed);

        users.set_blocked("ada", true).unwrap();
        assert_eq!(
            check(&store, Some(&context("ada"))).unwrap(),
            Decision::Deny(Denial::UserBlocked)
        );
    }

    #[test]
    fn unknown_user_proceeds() {
        let (store, _dir) = temp_store();
        assert_eq!(check(&store, Some(&context("ghost"))).unwrap(), Decision::Proceed);
    }

    #[test]
    fn lookup_failure_is_reported_then_fails_open() {
        let (store, _dir) = temp_store();
        store.breaker().force_open();

        let result = check(&store, Some(&context("ada")));
        assert!(matches!(result, Err(InfraError::Storage(_))));
        assert_eq!(fail_open("blocked_user", result), Decision::Proceed);
    }
}
