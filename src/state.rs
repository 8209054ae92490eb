// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{AuthService, RefreshTokenService, TokenCodec};
use crate::config::{AppConfig, SettingsError};
use crate::events::EventPublisher;
use crate::storage::{BookmarkCache, Store};

/// Shared state handed to every handler and gate.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tokens: Arc<TokenCodec>,
    pub auth: Arc<AuthService>,
    pub bookmark_cache: Arc<BookmarkCache>,
    pub auth_rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<Store>, events: EventPublisher) -> Result<Self, SettingsError> {
        let key = config.signing_key()?;
        let tokens = Arc::new(TokenCodec::new(
            &key,
            config.access_token_ttl()?,
            config.reset_token_ttl()?,
        ));
        let refresh = RefreshTokenService::new(store.clone(), key, config.refresh_token_ttl()?);
        let auth = Arc::new(AuthService::new(
            store.clone(),
            tokens.clone(),
            refresh,
            events,
            config.client_url.clone(),
        ));

        Ok(Self {
            store,
            tokens,
            auth,
            bookmark_cache: Arc::new(BookmarkCache::default()),
            auth_rate_limiter: Arc::new(RateLimiter::new(
                config.auth_rate_limit,
                Duration::from_secs(config.auth_rate_window_secs),
            )),
        })
    }
}
