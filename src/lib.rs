// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blog Platform Server - REST backend for blogs, bookmarks and comments
//!
//! Users register and sign in for a short-lived HS256 access token plus a
//! rotating refresh token. Every API request passes three gates before its
//! handler runs: database health, JWT authentication and blocked-user
//! rejection.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum) and the OpenAPI document
//! - `auth` - Tokens, password hashing and the account service
//! - `gate` - Request gates in front of every API route
//! - `events` - Domain events and transactional email
//! - `storage` - Embedded redb store behind a circuit breaker

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
