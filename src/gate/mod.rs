// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Gates
//!
//! Three middleware run in front of every API handler, outermost first:
//!
//! ```text
//! request ─▶ db_health ─▶ jwt ─▶ blocked_user ─▶ handler
//!              │                     │
//!              └─ 503 breaker open   └─ 403 user is blocked
//! ```
//!
//! A gate's decision function returns `Result<Decision, InfraError>`. Only a
//! confirmed [`Denial`] stops a request; when the check itself fails the
//! gate logs and lets the request through ([`fail_open`]).

pub mod blocked_user;
pub mod db_health;
pub mod jwt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::{ErrorEnvelope, DATABASE_UNAVAILABLE_MESSAGE};
use crate::storage::{BreakerUnavailable, DbError};

pub use blocked_user::blocked_user_gate;
pub use db_health::db_health_gate;
pub use jwt::jwt_gate;

/// Body of the blocked-user refusal.
pub const USER_BLOCKED_MESSAGE: &str = "User is blocked";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Deny(Denial),
}

/// Why a gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Storage breaker is open; carries the request path for the envelope.
    DatabaseUnavailable { path: String },
    UserBlocked,
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        match self {
            Denial::DatabaseUnavailable { path } => {
                ErrorEnvelope::new(StatusCode::SERVICE_UNAVAILABLE, DATABASE_UNAVAILABLE_MESSAGE)
                    .with_path(path)
                    .into_response()
            }
            Denial::UserBlocked => (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": USER_BLOCKED_MESSAGE })),
            )
                .into_response(),
        }
    }
}

/// A gate could not reach a decision.
#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("circuit breaker state unavailable: {0}")]
    Breaker(#[from] BreakerUnavailable),

    #[error("user lookup failed: {0}")]
    Storage(#[from] DbError),
}

/// Collapse a gate result, turning infrastructure failures into `Proceed`.
pub fn fail_open(gate: &'static str, result: Result<Decision, InfraError>) -> Decision {
    match result {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(gate, error = %e, "Gate check failed, letting request through");
            Decision::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn infrastructure_errors_fail_open() {
        let decision = fail_open("test", Err(InfraError::Storage(DbError::Unavailable)));
        assert_eq!(decision, Decision::Proceed);

        let denied = fail_open("test", Ok(Decision::Deny(Denial::UserBlocked)));
        assert_eq!(denied, Decision::Deny(Denial::UserBlocked));
    }

    #[tokio::test]
    async fn blocked_denial_has_minimal_body() {
        let response = Denial::UserBlocked.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "User is blocked" }));
    }

    #[tokio::test]
    async fn unavailable_denial_carries_path() {
        let response = Denial::DatabaseUnavailable {
            path: "/blogs".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["path"], "/blogs");
        assert_eq!(body["status"], 503);
        assert_eq!(body["error"], "Service Unavailable");
        assert_eq!(body["message"], DATABASE_UNAVAILABLE_MESSAGE);
    }
}
