// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless access tokens plus rotating refresh tokens.
//!
//! ## Auth Flow
//!
//! 1. `POST /auth/login` (or register) returns `{token, refreshToken}`
//! 2. Clients send `Authorization: Bearer <token>` on every API call
//! 3. The JWT gate verifies the HS256 signature and expiry and attaches a
//!    [`RequestContext`] to the request
//! 4. When the access token expires, `POST /auth/refresh` spends the refresh
//!    token and returns a new pair
//!
//! ## Security
//!
//! - Access tokens are never looked up in storage
//! - Only an HMAC of each refresh secret is stored
//! - A password reset revokes every refresh token of the user
//! - Password reset tokens are single-purpose and bound to the password
//!   hash they were issued against

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod roles;
pub mod service;

pub use claims::{AccessClaims, AuthenticatedUser, RequestContext, ResetClaims, TokenKind};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use jwt::TokenCodec;
pub use refresh::RefreshTokenService;
pub use roles::Role;
pub use service::AuthService;
