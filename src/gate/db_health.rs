// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Turns requests away with 503 while the storage breaker is open.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{fail_open, Decision, Denial, InfraError};
use crate::state::AppState;
use crate::storage::CircuitBreaker;

pub fn check(breaker: &CircuitBreaker, path: &str) -> Result<Decision, InfraError> {
    let state = breaker.state()?;
    if state.rejects_calls() {
        tracing::debug!(breaker = %state, path, "Rejecting request, database unavailable");
        return Ok(Decision::Deny(Denial::DatabaseUnavailable {
            path: path.to_string(),
        }));
    }
    Ok(Decision::Proceed)
}

pub async fn db_health_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let decision = fail_open("db_health", check(state.store.breaker(), request.uri().path()));
    match decision {
        Decision::Proceed => next.run(request).await,
        Decision::Deny(denial) => denial.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/blogs", get(|| async { "ok" }))
            .layer(from_fn_with_state(state.clone(), db_health_gate))
            .with_state(state)
    }

    async fn status(app: Router) -> StatusCode {
        app.oneshot(
            axum::http::Request::builder()
                .uri("/blogs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn closed_breaker_passes() {
        let (state, _dir) = test_state();
        assert_eq!(status(app(state)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn open_breaker_short_circuits() {
        let (state, _dir) = test_state();
        state.store.breaker().force_open();
        assert_eq!(status(app(state.clone())).await, StatusCode::SERVICE_UNAVAILABLE);

        state.store.breaker().reset();
        assert_eq!(status(app(state)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn unreadable_breaker_fails_open() {
        let (state, _dir) = test_state();
        state.store.breaker().poison();
        assert_eq!(status(app(state)).await, StatusCode::OK);
    }
}
