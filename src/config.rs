// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once at startup from environment variables with
//! the `BLOG_` prefix, layered over the defaults below.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BLOG_HOST` | Server bind address | `0.0.0.0` |
//! | `BLOG_PORT` | Server bind port | `8080` |
//! | `BLOG_DATA_DIR` | Directory holding the redb database | `./data` |
//! | `BLOG_JWT_SECRET` | Base64-encoded HMAC key (at least 32 bytes decoded) | development key |
//! | `BLOG_JWT_EXPIRATION_SECS` | Access token lifetime | `259200` |
//! | `BLOG_REFRESH_TTL_SECS` | Refresh token lifetime | `2592000` |
//! | `BLOG_RESET_TOKEN_TTL_SECS` | Password reset token lifetime | `900` |
//! | `BLOG_CLIENT_URL` | Prefix of password reset links | `http://localhost:3000/reset-password?token=` |
//! | `BLOG_MAIL_API_KEY` | Resend API key (empty logs emails instead) | empty |
//! | `BLOG_MAIL_FROM` | Sender address for notifications | `no-reply@blog.local` |
//! | `BLOG_BREAKER_FAILURE_THRESHOLD` | Consecutive storage failures before opening | `5` |
//! | `BLOG_BREAKER_SUCCESS_THRESHOLD` | Half-open successes before closing | `2` |
//! | `BLOG_BREAKER_OPEN_SECS` | Seconds spent open before probing | `30` |
//! | `BLOG_MAINTENANCE_MODE` | Start with the breaker forced open | `false` |
//! | `BLOG_AUTH_RATE_LIMIT` | Requests per window on `/auth/*`, per client | `10` |
//! | `BLOG_AUTH_RATE_WINDOW_SECS` | Rate limit window | `60` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,blog_platform_server=debug,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use serde::Deserialize;

use crate::storage::CircuitBreakerConfig;

/// Prefix shared by every application variable.
pub const ENV_PREFIX: &str = "BLOG";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Name of the database file inside the data directory.
pub const DATABASE_FILE: &str = "blog.redb";

/// Signing key used when `BLOG_JWT_SECRET` is not set.
///
/// Only suitable for local development; a warning is logged at startup.
pub const DEVELOPMENT_JWT_SECRET: &str = "ZGV2ZWxvcG1lbnQtb25seS1zaWduaW5nLWtleS1jaGFuZ2UtbWUhIQ==";

/// Minimum decoded length of the HMAC signing key (HS256 wants 256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Upper bound on any token lifetime: ten years.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid JWT secret: {0}")]
    InvalidSecret(String),

    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("invalid token lifetime: {0}")]
    InvalidLifetime(String),
}

/// Typed application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    #[serde(default = "default_reset_ttl")]
    pub reset_token_ttl_secs: i64,
    #[serde(default = "default_client_url")]
    pub client_url: String,
    #[serde(default)]
    pub mail_api_key: String,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    #[serde(default = "default_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub breaker_success_threshold: u32,
    #[serde(default = "default_open_secs")]
    pub breaker_open_secs: u64,
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default = "default_auth_rate_limit")]
    pub auth_rate_limit: u32,
    #[serde(default = "default_auth_rate_window")]
    pub auth_rate_window_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_jwt_secret() -> String {
    DEVELOPMENT_JWT_SECRET.into()
}

fn default_jwt_expiration() -> i64 {
    259_200
}

fn default_refresh_ttl() -> i64 {
    2_592_000
}

fn default_reset_ttl() -> i64 {
    900
}

fn default_client_url() -> String {
    "http://localhost:3000/reset-password?token=".into()
}

fn default_mail_from() -> String {
    "no-reply@blog.local".into()
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_secs() -> u64 {
    30
}

fn default_auth_rate_limit() -> u32 {
    10
}

fn default_auth_rate_window() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            jwt_secret: default_jwt_secret(),
            jwt_expiration_secs: default_jwt_expiration(),
            refresh_ttl_secs: default_refresh_ttl(),
            reset_token_ttl_secs: default_reset_ttl(),
            client_url: default_client_url(),
            mail_api_key: String::new(),
            mail_from: default_mail_from(),
            breaker_failure_threshold: default_failure_threshold(),
            breaker_success_threshold: default_success_threshold(),
            breaker_open_secs: default_open_secs(),
            maintenance_mode: false,
            auth_rate_limit: default_auth_rate_limit(),
            auth_rate_window_secs: default_auth_rate_window(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        let source = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .try_parsing(true);
        Self::from_source(source)
    }

    fn from_source(source: config::Environment) -> Result<Self, SettingsError> {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.signing_key()?;
        config.access_token_ttl()?;
        config.refresh_token_ttl()?;
        config.reset_token_ttl()?;
        Ok(config)
    }

    /// Access token lifetime, checked to lie in `1..=MAX_TOKEN_LIFETIME_SECS`.
    pub fn access_token_ttl(&self) -> Result<chrono::Duration, SettingsError> {
        lifetime("jwt_expiration_secs", self.jwt_expiration_secs)
    }

    pub fn refresh_token_ttl(&self) -> Result<chrono::Duration, SettingsError> {
        lifetime("refresh_ttl_secs", self.refresh_ttl_secs)
    }

    pub fn reset_token_ttl(&self) -> Result<chrono::Duration, SettingsError> {
        lifetime("reset_token_ttl_secs", self.reset_token_ttl_secs)
    }

    /// Decoded HMAC signing key.
    pub fn signing_key(&self) -> Result<Vec<u8>, SettingsError> {
        let key = Base64::decode_vec(self.jwt_secret.trim())
            .map_err(|e| SettingsError::InvalidSecret(format!("not valid base64: {e}")))?;
        if key.len() < MIN_SECRET_BYTES {
            return Err(SettingsError::InvalidSecret(format!(
                "decoded key is {} bytes, need at least {MIN_SECRET_BYTES}",
                key.len()
            )));
        }
        Ok(key)
    }

    /// Whether the built-in development key is in use.
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| SettingsError::InvalidBindAddress(format!("{}:{} ({e})", self.host, self.port)))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            success_threshold: self.breaker_success_threshold.max(1),
            open_duration: Duration::from_secs(self.breaker_open_secs),
        }
    }
}

fn lifetime(name: &str, secs: i64) -> Result<chrono::Duration, SettingsError> {
    if !(1..=MAX_TOKEN_LIFETIME_SECS).contains(&secs) {
        return Err(SettingsError::InvalidLifetime(format!(
            "{name} is {secs}, must be between 1 and {MAX_TOKEN_LIFETIME_SECS} seconds"
        )));
    }
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| SettingsError::InvalidLifetime(format!("{name} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = AppConfig::from_source(env(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_expiration_secs, 259_200);
        assert_eq!(config.refresh_ttl_secs, 2_592_000);
        assert!(config.uses_development_secret());
        assert!(!config.maintenance_mode);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_source(env(&[
            ("BLOG_PORT", "9090"),
            ("BLOG_MAINTENANCE_MODE", "true"),
            ("BLOG_CLIENT_URL", "https://blog.example/reset?token="),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert!(config.maintenance_mode);
        assert_eq!(config.client_url, "https://blog.example/reset?token=");
    }

    #[test]
    fn short_secret_is_rejected() {
        let result = AppConfig::from_source(env(&[("BLOG_JWT_SECRET", "c2hvcnQ=")]));
        assert!(matches!(result, Err(SettingsError::InvalidSecret(_))));
    }

    #[test]
    fn development_secret_decodes_to_a_usable_key() {
        let key = AppConfig::default().signing_key().unwrap();
        assert!(key.len() >= MIN_SECRET_BYTES);
    }

    #[test]
    fn token_lifetimes_must_be_positive() {
        for (var, value) in [
            ("BLOG_JWT_EXPIRATION_SECS", "0"),
            ("BLOG_REFRESH_TTL_SECS", "-60"),
            ("BLOG_RESET_TOKEN_TTL_SECS", "0"),
        ] {
            let result = AppConfig::from_source(env(&[(var, value)]));
            assert!(
                matches!(result, Err(SettingsError::InvalidLifetime(_))),
                "{var}={value} was accepted"
            );
        }
    }

    #[test]
    fn token_lifetimes_are_capped() {
        let result = AppConfig::from_source(env(&[("BLOG_JWT_EXPIRATION_SECS", "10000000000000")]));
        assert!(matches!(result, Err(SettingsError::InvalidLifetime(_))));

        let config = AppConfig {
            refresh_ttl_secs: i64::MAX,
            ..AppConfig::default()
        };
        assert!(config.refresh_token_ttl().is_err());

        let config = AppConfig {
            jwt_expiration_secs: MAX_TOKEN_LIFETIME_SECS,
            ..AppConfig::default()
        };
        assert_eq!(
            config.access_token_ttl().unwrap(),
            chrono::Duration::seconds(MAX_TOKEN_LIFETIME_SECS)
        );
    }

    #[test]
    fn breaker_thresholds_never_drop_to_zero() {
        let config = AppConfig {
            breaker_failure_threshold: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.breaker_config().failure_threshold, 1);
    }
}
