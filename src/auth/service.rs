// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account and session operations behind `/auth/*`.
//!
//! Each operation is independent: it reads what it needs from the store,
//! writes its result, then publishes at most one domain event. Events are
//! queued after the store write, so a failed notification never undoes the
//! operation that triggered it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::jwt::password_fingerprint;
use super::password::{hash_password, verify_password, verify_unknown_user};
use super::refresh::RefreshTokenService;
use super::{AuthError, Role, TokenCodec};
use crate::audit_log;
use crate::events::{DomainEvent, EventPublisher};
use crate::models::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
    TokenPairResponse,
};
use crate::storage::{
    AuditEvent, AuditEventType, NewUser, Store, StoredUser, UserConflict, UserRepository,
};

pub const RESET_SUCCESS_MESSAGE: &str = "Password Reset success";

pub struct AuthService {
    store: Arc<Store>,
    tokens: Arc<TokenCodec>,
    refresh: RefreshTokenService,
    events: EventPublisher,
    client_url: String,
}

impl AuthService {
    pub fn new(
        store: Arc<Store>,
        tokens: Arc<TokenCodec>,
        refresh: RefreshTokenService,
        events: EventPublisher,
        client_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            tokens,
            refresh,
            events,
            client_url: client_url.into(),
        }
    }

    /// Create a USER account and sign it in.
    pub fn register(&self, request: &RegisterRequest) -> Result<TokenPairResponse, AuthError> {
        info!(username = %request.username, "Registering user");

        let password_hash = hash_password(&request.password)?;
        let created = UserRepository::new(&self.store).create(NewUser {
            username: request.username.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            password_hash,
            role: Role::User,
        })?;

        let user = match created {
            Ok(user) => user,
            Err(UserConflict::Username) => {
                return Err(AuthError::UsernameTaken(request.username.clone()))
            }
            Err(UserConflict::Email) => return Err(AuthError::EmailTaken(request.email.clone())),
        };

        let pair = self.issue_pair(&user)?;

        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::UserRegistered).with_user(user.id, &user.username)
        );
        self.events.publish(DomainEvent::UserRegistered {
            email: user.email.clone(),
            username: user.username.clone(),
        });

        debug!(user_id = user.id, "User registered");
        Ok(pair)
    }

    /// Verify credentials and issue a fresh token pair.
    ///
    /// Blocked users still receive tokens; the blocked-user gate refuses
    /// their subsequent requests.
    pub fn login(&self, request: &LoginRequest) -> Result<TokenPairResponse, AuthError> {
        info!(username = %request.username, "Authenticating user");

        let Some(user) = UserRepository::new(&self.store).find_by_username(&request.username)? else {
            // Same hashing cost as a wrong password
            let err = verify_unknown_user(&request.password);
            self.audit_login_failure(&request.username, "unknown username");
            return Err(err);
        };

        if let Err(e) = verify_password(&request.password, &user.password_hash) {
            if matches!(e, AuthError::BadCredentials) {
                self.audit_login_failure(&request.username, "wrong password");
            }
            return Err(e);
        }

        let pair = self.issue_pair(&user)?;
        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::LoginSucceeded).with_user(user.id, &user.username)
        );
        debug!(user_id = user.id, "Login successful");
        Ok(pair)
    }

    /// Mail a single-use reset link to the account owning `email`.
    pub fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<MessageResponse, AuthError> {
        info!("Generating password reset token");

        let user = UserRepository::new(&self.store)
            .find_by_email(&request.email)?
            .ok_or_else(|| AuthError::EmailNotFound(request.email.clone()))?;

        let token = self
            .tokens
            .issue_reset(user.id, &user.username, &user.password_hash)?;
        let reset_link = format!("{}{}", self.client_url, token);

        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::PasswordResetRequested).with_user(user.id, &user.username)
        );
        self.events.publish(DomainEvent::ForgotPassword {
            email: user.email.clone(),
            username: user.username.clone(),
            reset_link,
        });

        Ok(MessageResponse::new(format!(
            "Reset link has been sent to your registered email {}",
            user.email
        )))
    }

    /// Set a new password using a reset token, then end every session.
    pub fn reset_password(&self, request: &ResetPasswordRequest) -> Result<MessageResponse, AuthError> {
        let claims = self.tokens.decode_reset(&request.token)?;
        let users = UserRepository::new(&self.store);

        let user = users
            .find_by_id(claims.uid)?
            .ok_or_else(|| AuthError::UsernameNotFound(claims.sub.clone()))?;
        if password_fingerprint(&user.password_hash) != claims.pwv {
            warn!(user_id = user.id, "Reset token does not match the current password");
            return Err(AuthError::InvalidResetToken);
        }

        let new_hash = hash_password(&request.new_password)?;
        let Some(user) = users.replace_password(user.id, &user.password_hash, &new_hash)? else {
            warn!(user_id = user.id, "Password changed while reset was in flight");
            return Err(AuthError::InvalidResetToken);
        };

        let revoked = self.refresh.revoke_all_for_user(user.id)?;
        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::PasswordReset)
                .with_user(user.id, &user.username)
                .with_details(serde_json::json!({ "revoked_sessions": revoked }))
        );
        self.events.publish(DomainEvent::PasswordReset {
            email: user.email.clone(),
            username: user.username.clone(),
        });

        debug!(user_id = user.id, "Password reset");
        Ok(MessageResponse::new(RESET_SUCCESS_MESSAGE))
    }

    /// Exchange a refresh token for a new pair. The presented token is spent.
    pub fn refresh(&self, raw: &str) -> Result<TokenPairResponse, AuthError> {
        let pair = match self.refresh.rotate(raw)? {
            Some(next) => match self.refresh.validate_and_get_user(&next)? {
                Some(user) => Some(TokenPairResponse {
                    token: self.access_token(&user)?,
                    refresh_token: next,
                }),
                None => None,
            },
            None => None,
        };

        pair.ok_or_else(|| {
            audit_log!(
                &self.store,
                AuditEvent::new(AuditEventType::RefreshRejected).failed("invalid refresh token")
            );
            AuthError::InvalidRefreshToken(raw.to_string())
        })
    }

    /// Revoke the presented refresh token. Invalid tokens are ignored.
    pub fn logout(&self, raw: &str) -> Result<(), AuthError> {
        if self.refresh.revoke(raw)? {
            audit_log!(&self.store, AuditEvent::new(AuditEventType::Logout));
        }
        Ok(())
    }

    fn issue_pair(&self, user: &StoredUser) -> Result<TokenPairResponse, AuthError> {
        Ok(TokenPairResponse {
            token: self.access_token(user)?,
            refresh_token: self.refresh.issue(user.id)?,
        })
    }

    fn access_token(&self, user: &StoredUser) -> Result<String, AuthError> {
        self.tokens
            .issue_access(user.id, &user.username, &[user.role])
    }

    fn audit_login_failure(&self, username: &str, reason: &str) {
        audit_log!(
            &self.store,
            AuditEvent::new(AuditEventType::LoginFailed)
                .with_username(username)
                .failed(reason)
        );
    }
}
