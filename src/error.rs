// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API error type and the JSON error envelope.
//!
//! Every error leaving the service has the same shape:
//!
//! ```json
//! {"timestamp": "...", "path": "/blogs/7", "status": 404,
//!  "error": "Not Found", "message": "Blog 7 not found"}
//! ```
//!
//! Handlers do not know their request path, so [`ApiError`] renders without
//! one and stashes the envelope in the response extensions;
//! [`attach_error_path`] fills it in on the way out.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::storage::DbError;

/// Message used for 503 responses caused by the storage circuit breaker.
pub const DATABASE_UNAVAILABLE_MESSAGE: &str =
    "Service is temporarily unavailable due to database connection failure. Please try again later.";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub field_errors: BTreeMap<String, String>,
}

/// Structured error body.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            path: None,
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.clone())).into_response();
        if self.path.is_none() {
            response.extensions_mut().insert(self);
        }
        response
    }
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, DATABASE_UNAVAILABLE_MESSAGE)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error")
    }

    /// 400 carrying per-field messages.
    pub fn validation(field_errors: BTreeMap<String, String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            field_errors,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(self.status, self.message.clone());
        envelope.field_errors = self.field_errors.clone();
        envelope
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.envelope().into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (camel_case(&field), message)
            })
            .collect();
        ApiError::validation(fields)
    }
}

/// Field names are reported the way they appear in JSON bodies.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            DbError::Conflict(what) => ApiError::bad_request(format!("{what} already exists")),
            DbError::Unavailable => ApiError::service_unavailable(),
            other => {
                tracing::error!(error = %other, "Storage operation failed");
                ApiError::internal()
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        ApiError::bad_request("Malformed JSON request")
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected query string");
        ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<axum::extract::rejection::PathRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        use axum::extract::rejection::PathRejection;
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                ApiError::bad_request(format!("Invalid path parameter: {}", e.body_text()))
            }
            other => {
                tracing::error!(error = %other, "Path parameters missing from route");
                ApiError::internal()
            }
        }
    }
}

/// Middleware completing error envelopes with the request path.
pub async fn attach_error_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if let Some(envelope) = response.extensions_mut().remove::<ErrorEnvelope>() {
        match serde_json::to_vec(&envelope.with_path(path)) {
            Ok(bytes) => {
                response.headers_mut().remove(header::CONTENT_LENGTH);
                *response.body_mut() = Body::from(bytes);
            }
            Err(e) => tracing::error!(error = %e, "Failed to re-render error envelope"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let down = ApiError::service_unavailable();
        assert_eq!(down.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.message, DATABASE_UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn storage_errors_map_to_statuses() {
        assert_eq!(ApiError::from(DbError::NotFound("Blog 3".into())).status, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(DbError::Unavailable).status, StatusCode::SERVICE_UNAVAILABLE);
        let io = serde_json::from_str::<u8>("x").unwrap_err();
        let internal = ApiError::from(DbError::Serde(io));
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "Unexpected error");
    }

    #[tokio::test]
    async fn into_response_returns_envelope() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["message"], "bad data");
        assert!(body.get("timestamp").is_some());
        assert!(body.get("fieldErrors").is_none());
    }

    #[test]
    fn field_names_follow_json_casing() {
        assert_eq!(camel_case("first_name"), "firstName");
        assert_eq!(camel_case("username"), "username");
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("username".to_string(), "Username is required".to_string());
        let response = ApiError::validation(fields).into_response();

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["fieldErrors"]["username"], "Username is required");
    }

    #[tokio::test]
    async fn middleware_fills_in_request_path() {
        let app = Router::new()
            .route(
                "/blogs/{id}",
                get(|| async { ApiError::not_found("Blog 7 not found") }),
            )
            .layer(axum::middleware::from_fn(attach_error_path));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/blogs/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["path"], "/blogs/7");
        assert_eq!(body["message"], "Blog 7 not found");
    }
}
