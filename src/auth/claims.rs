// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Purpose of a signed token. Checked on every decode so a token minted for
/// one purpose is never accepted for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    PasswordReset,
}

/// Claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (username)
    pub sub: String,
    pub uid: u64,
    pub uname: String,
    pub roles: Vec<Role>,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of a password reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    /// Subject (username)
    pub sub: String,
    pub uid: u64,
    pub typ: TokenKind,
    /// Fingerprint of the password hash current at issue time.
    pub pwv: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user information extracted from an access token.
///
/// This is the primary type used throughout the application to represent
/// the principal making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: u64,
    pub username: String,
    pub roles: Vec<Role>,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.uid,
            username: claims.uname,
            roles: claims.roles,
            expires_at: claims.exp,
        }
    }

    /// Check if any granted role covers the required one.
    pub fn has_role(&self, required: Role) -> bool {
        self.roles.iter().any(|r| r.has_privilege(required))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Per-request security context.
///
/// Inserted into the request extensions by the JWT gate and read by the
/// blocked-user gate and the extractors. `principal` is `None` for
/// anonymous requests.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: AuthenticatedUser) -> Self {
        Self {
            principal: Some(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims(roles: Vec<Role>) -> AccessClaims {
        AccessClaims {
            sub: "ada".to_string(),
            uid: 42,
            uname: "ada".to_string(),
            roles,
            typ: TokenKind::Access,
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        }
    }

    #[test]
    fn from_claims_copies_identity() {
        let user = AuthenticatedUser::from_claims(sample_claims(vec![Role::User]));
        assert_eq!(user.user_id, 42);
        assert_eq!(user.username, "ada");
        assert_eq!(user.expires_at, 1_700_003_600);
        assert!(!user.is_admin());
    }

    #[test]
    fn admin_role_grants_user_privileges() {
        let user = AuthenticatedUser::from_claims(sample_claims(vec![Role::Admin]));
        assert!(user.is_admin());
        assert!(user.has_role(Role::User));
    }

    #[test]
    fn claims_wire_format() {
        let json = serde_json::to_value(sample_claims(vec![Role::Admin])).unwrap();
        assert_eq!(json["typ"], "access");
        assert_eq!(json["roles"][0], "ADMIN");
        assert_eq!(json["uid"], 42);
    }
}
