// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Argon2id password hashing.
//!
//! Hashes are PHC strings carrying their own salt and parameters.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use super::AuthError;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InternalError(format!("Failed to hash password: {e}")))
}

/// Check `password` against a stored PHC string.
///
/// A mismatch is [`AuthError::BadCredentials`]; an unparseable stored hash is
/// an internal error.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::InternalError(format!("Invalid password hash: {e}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::BadCredentials)
}

/// Well-formed hash under the default parameters that matches no password.
const UNMATCHABLE_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Spend the same argon2 work as [`verify_password`] for a login whose
/// username does not exist. Always fails.
pub fn verify_unknown_user(password: &str) -> AuthError {
    match verify_password(password, UNMATCHABLE_HASH) {
        Ok(()) | Err(AuthError::BadCredentials) => AuthError::BadCredentials,
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_hash_uses_default_parameters() {
        let fresh = hash_password("pw-123456").unwrap();
        let params = |hash: &str| hash.split('$').take(4).collect::<Vec<_>>().join("$");
        assert_eq!(params(UNMATCHABLE_HASH), params(&fresh));
    }

    #[test]
    fn unknown_user_never_verifies() {
        assert!(matches!(verify_unknown_user(""), AuthError::BadCredentials));
        assert!(matches!(verify_unknown_user("correct horse"), AuthError::BadCredentials));
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("pw-123456").unwrap(), hash_password("pw-123456").unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_internal_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InternalError(_))
        ));
    }
}
