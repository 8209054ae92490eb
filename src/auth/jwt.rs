// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 token codec.
//!
//! Access tokens are stateless: validity is signature plus expiry, never a
//! store lookup. Password reset tokens share the key but carry a distinct
//! `typ` and a fingerprint of the password hash they were minted against.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use super::claims::{AccessClaims, ResetClaims, TokenKind};
use super::{AuthError, Role};

/// Hex characters of the password-hash digest embedded in reset tokens.
const FINGERPRINT_LEN: usize = 16;

/// Signs and verifies access and password reset tokens.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from the decoded HMAC key.
    pub fn new(key: &[u8], access_ttl: Duration, reset_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            access_ttl,
            reset_ttl,
        }
    }

    /// Issue an access token for the given identity.
    pub fn issue_access(&self, user_id: u64, username: &str, roles: &[Role]) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: username.to_string(),
            uid: user_id,
            uname: username.to_string(),
            roles: roles.to_vec(),
            typ: TokenKind::Access,
            iat: now.timestamp(),
            exp: expiry(now, self.access_ttl)?,
        };
        self.sign(&claims)
    }

    /// Whether `token` is a correctly signed, unexpired access token.
    pub fn validate(&self, token: &str) -> bool {
        self.decode_access(token).is_ok()
    }

    /// Verify and decode an access token.
    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = self.verify(token)?;
        if claims.typ != TokenKind::Access {
            return Err(AuthError::MalformedToken);
        }
        Ok(claims)
    }

    /// Username of a valid access token.
    pub fn extract_username(&self, token: &str) -> Option<String> {
        self.decode_access(token).ok().map(|c| c.uname)
    }

    /// User id of a valid access token.
    pub fn extract_user_id(&self, token: &str) -> Option<u64> {
        self.decode_access(token).ok().map(|c| c.uid)
    }

    /// Roles of a valid access token.
    pub fn extract_roles(&self, token: &str) -> Option<Vec<Role>> {
        self.decode_access(token).ok().map(|c| c.roles)
    }

    /// Issue a single-purpose password reset token.
    pub fn issue_reset(&self, user_id: u64, username: &str, password_hash: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: username.to_string(),
            uid: user_id,
            typ: TokenKind::PasswordReset,
            pwv: password_fingerprint(password_hash),
            iat: now.timestamp(),
            exp: expiry(now, self.reset_ttl)?,
        };
        self.sign(&claims)
    }

    /// Verify and decode a password reset token.
    ///
    /// The caller still has to compare `pwv` against the stored hash.
    pub fn decode_reset(&self, token: &str) -> Result<ResetClaims, AuthError> {
        let claims: ResetClaims = self.verify(token).map_err(|_| AuthError::InvalidResetToken)?;
        if claims.typ != TokenKind::PasswordReset {
            return Err(AuthError::InvalidResetToken);
        }
        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("token signing failed: {e}")))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })
    }
}

/// `now + ttl` as a unix timestamp, refusing to overflow.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, AuthError> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| AuthError::InternalError("token expiry out of range".into()))
}

/// Short digest of a password hash, binding reset tokens to one password.
pub fn password_fingerprint(password_hash: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(password_hash.as_bytes()));
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    pub(crate) const TEST_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    pub(crate) fn codec() -> TokenCodec {
        TokenCodec::new(TEST_KEY, Duration::hours(1), Duration::minutes(15))
    }

    #[test]
    fn access_round_trip() {
        let codec = codec();
        let token = codec.issue_access(7, "ada", &[Role::User, Role::Admin]).unwrap();

        assert!(codec.validate(&token));
        assert_eq!(codec.extract_username(&token).as_deref(), Some("ada"));
        assert_eq!(codec.extract_user_id(&token), Some(7));
        assert_eq!(codec.extract_roles(&token), Some(vec![Role::User, Role::Admin]));

        let claims = codec.decode_access(&token).unwrap();
        assert_eq!(claims.sub, "ada");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = codec();
        let token = codec.issue_access(7, "ada", &[Role::User]).unwrap();

        let (body, signature) = token.rsplit_once('.').unwrap();
        let mut sig = URL_SAFE_NO_PAD.decode(signature).unwrap();
        sig[0] ^= 0x01;
        let tampered = format!("{body}.{}", URL_SAFE_NO_PAD.encode(sig));

        assert!(!codec.validate(&tampered));
        assert!(matches!(codec.decode_access(&tampered), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = codec();
        let token = codec.issue_access(7, "ada", &[Role::User]).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "ada", "uid": 7, "uname": "ada", "roles": ["ADMIN"],
                "typ": "access", "iat": 0, "exp": 4_000_000_000i64
            })
            .to_string(),
        );
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(!codec.validate(&tampered));
    }

    #[test]
    fn expired_token_is_rejected_despite_valid_signature() {
        let codec = TokenCodec::new(TEST_KEY, Duration::seconds(-10), Duration::minutes(15));
        let token = codec.issue_access(7, "ada", &[Role::User]).unwrap();

        assert!(!codec.validate(&token));
        assert!(matches!(codec.decode_access(&token), Err(AuthError::TokenExpired)));
        assert_eq!(codec.extract_username(&token), None);
    }

    #[test]
    fn foreign_key_and_garbage_are_rejected() {
        let other = TokenCodec::new(
            b"ffffffffffffffffffffffffffffffff",
            Duration::hours(1),
            Duration::minutes(15),
        );
        let token = other.issue_access(7, "ada", &[Role::User]).unwrap();
        assert!(!codec().validate(&token));
        assert!(!codec().validate("not-a-jwt"));
        assert!(!codec().validate(""));
    }

    #[test]
    fn reset_and_access_tokens_are_not_interchangeable() {
        let codec = codec();
        let reset = codec.issue_reset(7, "ada", "$argon2id$hash").unwrap();
        let access = codec.issue_access(7, "ada", &[Role::User]).unwrap();

        assert!(!codec.validate(&reset));
        assert!(matches!(codec.decode_reset(&access), Err(AuthError::InvalidResetToken)));

        let claims = codec.decode_reset(&reset).unwrap();
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.pwv, password_fingerprint("$argon2id$hash"));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn overflowing_lifetime_is_an_error() {
        let codec = TokenCodec::new(TEST_KEY, Duration::MAX, Duration::MAX);
        assert!(matches!(
            codec.issue_access(7, "ada", &[Role::User]),
            Err(AuthError::InternalError(_))
        ));
        assert!(matches!(
            codec.issue_reset(7, "ada", "$argon2id$hash"),
            Err(AuthError::InternalError(_))
        ));
    }

    #[test]
    fn fingerprint_is_short_and_hash_specific() {
        let a = password_fingerprint("$argon2id$a");
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, password_fingerprint("$argon2id$b"));
    }
}
