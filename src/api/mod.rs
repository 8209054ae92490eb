// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface.
//!
//! API routes sit behind the request gates (database health, then JWT, then
//! blocked user). Health probes and the OpenAPI UI are merged outside them.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::attach_error_path,
    gate::{blocked_user_gate, db_health_gate, jwt_gate},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod blogs;
pub mod bookmarks;
pub mod comments;
pub mod health;
pub mod rate_limit;
pub mod validated;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::auth_rate_limit));

    // Layers wrap inside-out: the last one added runs first
    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/admin/block-user", post(admin::block_user))
        .route("/admin/audit", get(admin::query_audit_logs))
        .route("/blogs", get(blogs::list_blogs).post(blogs::create_blog))
        .route("/blogs/filter", get(blogs::filter_blogs))
        .route("/blogs/author/{username}", get(blogs::list_by_author))
        .route("/blogs/{id}", get(blogs::get_blog))
        .route("/api/bookmarks", get(bookmarks::list_bookmarks))
        .route("/api/bookmarks/check", get(bookmarks::check_bookmark))
        .route(
            "/api/bookmarks/{blog_id}",
            post(bookmarks::add_bookmark).delete(bookmarks::remove_bookmark),
        )
        .route("/api/bookmarks/{blog_id}/toggle", post(bookmarks::toggle_bookmark))
        .route("/api/comments/create", post(comments::create_comment))
        .route("/api/comments/listAll", get(comments::list_comments))
        .route(
            "/api/comments/{id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route_layer(from_fn_with_state(state.clone(), blocked_user_gate))
        .route_layer(from_fn_with_state(state.clone(), jwt_gate))
        .route_layer(from_fn_with_state(state.clone(), db_health_gate));

    let probe_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .merge(api_routes)
        .merge(probe_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn(attach_error_path))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        auth::refresh,
        auth::logout,
        admin::block_user,
        admin::query_audit_logs,
        blogs::list_blogs,
        blogs::get_blog,
        blogs::list_by_author,
        blogs::create_blog,
        blogs::filter_blogs,
        bookmarks::add_bookmark,
        bookmarks::remove_bookmark,
        bookmarks::check_bookmark,
        bookmarks::toggle_bookmark,
        bookmarks::list_bookmarks,
        comments::create_comment,
        comments::list_comments,
        comments::delete_comment,
        comments::update_comment,
        health::health,
        health::liveness,
        health::readiness
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, sessions and password reset"),
        (name = "Admin", description = "User blocking and audit log"),
        (name = "Blogs", description = "Publishing and searching blogs"),
        (name = "Bookmarks", description = "Per-user blog bookmarks"),
        (name = "Comments", description = "Comments"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    info(
        title = "Blog Platform API",
        description = "Blogs, bookmarks and comments behind JWT sessions"
    )
)]
struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by secured paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
