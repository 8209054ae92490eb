// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rotating opaque refresh tokens.
//!
//! ## Wire Format
//!
//! ```text
//! <uuid id>.<base64url secret>
//! ```
//!
//! The id is the lookup key. The secret is 32 random bytes; only
//! `HMAC-SHA256(pepper, secret)` is stored, where the pepper is the token
//! signing key. A token is usable iff it is not revoked, not expired and its
//! secret matches the stored hash.

use std::sync::Arc;

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;
use crate::storage::{
    DbError, RefreshTokenRepository, Store, StoredRefreshToken, StoredUser, UserRepository,
};

type HmacSha256 = Hmac<Sha256>;

/// Bytes of entropy in a refresh secret.
const SECRET_BYTES: usize = 32;

/// Attempts at finding an unused token id before giving up.
const MAX_ID_ATTEMPTS: usize = 3;

/// A raw token split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRefreshToken<'a> {
    pub id: Uuid,
    pub secret: &'a str,
}

/// Split `raw` at the first dot.
///
/// Returns `None` when there is no dot, either side is empty, or the id is
/// not a UUID. Nothing is looked up for such tokens.
pub fn parse(raw: &str) -> Option<ParsedRefreshToken<'_>> {
    let (id, secret) = raw.split_once('.')?;
    if id.is_empty() || secret.is_empty() {
        return None;
    }
    let id = Uuid::parse_str(id).ok()?;
    Some(ParsedRefreshToken { id, secret })
}

struct FreshSecret {
    id: String,
    secret: String,
    secret_hash: String,
}

impl FreshSecret {
    fn raw(&self) -> String {
        format!("{}.{}", self.id, self.secret)
    }
}

/// Issues, validates, rotates and revokes refresh tokens.
pub struct RefreshTokenService {
    store: Arc<Store>,
    pepper: Vec<u8>,
    ttl: Duration,
}

impl RefreshTokenService {
    pub fn new(store: Arc<Store>, pepper: Vec<u8>, ttl: Duration) -> Self {
        Self { store, pepper, ttl }
    }

    /// Issue a fresh token for `user_id` and return its raw form.
    ///
    /// An id collision is retried with a new UUID.
    pub fn issue(&self, user_id: u64) -> Result<String, AuthError> {
        let repo = RefreshTokenRepository::new(&self.store);
        for _ in 0..MAX_ID_ATTEMPTS {
            let fresh = self.fresh_secret()?;
            let record = self.record(&fresh, user_id, Utc::now())?;
            match repo.insert(&record) {
                Ok(()) => return Ok(fresh.raw()),
                Err(DbError::Conflict(_)) => {
                    tracing::warn!(user_id, "Refresh token id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::InternalError("could not allocate a refresh token id".into()))
    }

    /// Owner of a usable token, or `None` for any invalid token.
    pub fn validate_and_get_user(&self, raw: &str) -> Result<Option<StoredUser>, AuthError> {
        let Some(parsed) = parse(raw) else {
            return Ok(None);
        };
        let Some(record) = RefreshTokenRepository::new(&self.store).find(&parsed.id.to_string())? else {
            return Ok(None);
        };
        if !record.is_active(Utc::now()) || !self.secret_matches(parsed.secret, &record.secret_hash) {
            return Ok(None);
        }
        Ok(UserRepository::new(&self.store).find_by_id(record.user_id)?)
    }

    /// Revoke a valid token and issue its successor in one transaction.
    ///
    /// Returns `None` if `raw` is invalid for any reason, including having
    /// been rotated already.
    pub fn rotate(&self, raw: &str) -> Result<Option<String>, AuthError> {
        let Some(parsed) = parse(raw) else {
            return Ok(None);
        };
        let old_id = parsed.id.to_string();
        let repo = RefreshTokenRepository::new(&self.store);

        for _ in 0..MAX_ID_ATTEMPTS {
            let fresh = self.fresh_secret()?;
            let now = Utc::now();
            // Owner is taken from the rotated record
            let successor = self.record(&fresh, 0, now)?;
            let result = repo.rotate(
                &old_id,
                |old| old.is_active(now) && self.secret_matches(parsed.secret, &old.secret_hash),
                |old| StoredRefreshToken {
                    user_id: old.user_id,
                    ..successor
                },
            );

            match result {
                Ok(Some(_)) => return Ok(Some(fresh.raw())),
                Ok(None) => return Ok(None),
                Err(DbError::Conflict(_)) => {
                    tracing::warn!(token_id = %old_id, "Refresh token id collision during rotation, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::InternalError("could not allocate a refresh token id".into()))
    }

    /// Revoke a single valid token. Returns whether anything was revoked.
    pub fn revoke(&self, raw: &str) -> Result<bool, AuthError> {
        let Some(parsed) = parse(raw) else {
            return Ok(false);
        };
        let id = parsed.id.to_string();
        let repo = RefreshTokenRepository::new(&self.store);
        let Some(record) = repo.find(&id)? else {
            return Ok(false);
        };
        if !self.secret_matches(parsed.secret, &record.secret_hash) {
            return Ok(false);
        }
        Ok(repo.revoke(&id)?)
    }

    /// Revoke every active token of a user.
    pub fn revoke_all_for_user(&self, user_id: u64) -> Result<usize, AuthError> {
        let revoked = RefreshTokenRepository::new(&self.store).revoke_all_for_user(user_id, Utc::now())?;
        tracing::info!(user_id, revoked, "Revoked refresh tokens");
        Ok(revoked)
    }

    /// Generate an id and secret, hashing the secret up front.
    fn fresh_secret(&self) -> Result<FreshSecret, AuthError> {
        let secret_bytes: [u8; SECRET_BYTES] = rand::thread_rng().gen();
        let secret = Base64UrlUnpadded::encode_string(&secret_bytes);
        Ok(FreshSecret {
            id: Uuid::new_v4().to_string(),
            secret_hash: self.hash_secret(&secret)?,
            secret,
        })
    }

    fn record(&self, fresh: &FreshSecret, user_id: u64, now: DateTime<Utc>) -> Result<StoredRefreshToken, AuthError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::InternalError("refresh token expiry out of range".into()))?;
        Ok(StoredRefreshToken {
            id: fresh.id.clone(),
            user_id,
            secret_hash: fresh.secret_hash.clone(),
            expires_at,
            revoked: false,
            created_at: now,
        })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.pepper)
            .map_err(|e| AuthError::InternalError(format!("invalid refresh pepper: {e}")))
    }

    fn hash_secret(&self, secret: &str) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(secret.as_bytes());
        Ok(Base64::encode_string(&mac.finalize().into_bytes()))
    }

    /// Constant-time comparison of `secret` against a stored hash.
    fn secret_matches(&self, secret: &str, stored_hash: &str) -> bool {
        let Ok(expected) = Base64::decode_vec(stored_hash) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(secret.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
