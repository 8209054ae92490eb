// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window rate limiting for the `/auth/*` routes.
//!
//! Counters are kept per client in a bounded LRU, so a flood of distinct
//! clients evicts the oldest windows instead of growing without bound.
//! Clients are keyed by the first `x-forwarded-for` address, else the peer
//! address, else `"anonymous"`.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lru::LruCache;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Clients tracked at once.
const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window ends, set when refused.
    pub retry_after: Option<u64>,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<LruCache<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_capacity(limit, window, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(limit: u32, window: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            limit: limit.max(1),
            window,
            windows: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Count one request from `client`.
    pub fn check(&self, client: &str) -> RateLimitResult {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> RateLimitResult {
        let Ok(mut windows) = self.windows.lock() else {
            warn!("Rate limiter state poisoned, allowing request (fail-open)");
            return RateLimitResult {
                allowed: true,
                limit: self.limit,
                remaining: self.limit,
                retry_after: None,
            };
        };

        let expired = windows
            .peek(client)
            .is_none_or(|w| now.duration_since(w.started) >= self.window);
        if expired {
            windows.put(client.to_string(), Window { started: now, count: 0 });
        }
        let Some(window) = windows.get_mut(client) else {
            return RateLimitResult {
                allowed: true,
                limit: self.limit,
                remaining: self.limit,
                retry_after: None,
            };
        };

        if window.count >= self.limit {
            let elapsed = now.duration_since(window.started);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return RateLimitResult {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                retry_after: Some(retry_after),
            };
        }

        window.count += 1;
        RateLimitResult {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - window.count,
            retry_after: None,
        }
    }
}

/// Key identifying the calling client.
pub fn client_key(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "anonymous".to_string())
}

pub async fn auth_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    let result = state.auth_rate_limiter.check(&client);

    if !result.allowed {
        warn!(
            client = %client,
            endpoint = %request.uri().path(),
            "Rate limit exceeded"
        );
        let mut response = ApiError::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
        add_rate_limit_headers(&mut response, &result);
        return response;
    }

    debug!(client = %client, remaining = result.remaining, "Request allowed");
    let mut response = next.run(request).await;
    add_rate_limit_headers(&mut response, &result);
    response
}

fn add_rate_limit_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    if let Some(retry_after) = result.retry_after {
        headers.insert("retry-after", HeaderValue::from(retry_after));
    }
}
