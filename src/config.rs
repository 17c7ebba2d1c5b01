// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! immutable [`GatewayConfig`] built from them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET_KEY` | Base64 HMAC secret, at least 32 bytes decoded | Required |
//! | `JWT_EXPIRATION_MS` | Token lifetime in milliseconds | `86400000` |
//! | `USER_SERVICE_URL` | Identity service base URL | `http://127.0.0.1:8081` |
//! | `RECIPE_SERVICE_URL` | Recipe service base URL | `http://127.0.0.1:8082` |
//! | `ROUTE_RULES_FILE` | JSON file with extra route rules | None |
//! | `UPSTREAM_TIMEOUT_SECS` | Per-request upstream timeout | `30` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both are set | None |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::TimeDelta;
use url::Url;

use crate::auth::codec::{decode_secret, SecretError, MIN_SECRET_LEN};
use crate::auth::routes::{load_rules, RouteRule, RuleError};
use crate::proxy::UpstreamRoute;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the shared token signing secret.
///
/// Standard base64, padded or not. Rotating it invalidates every
/// outstanding token.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET_KEY";

/// Environment variable name for the token lifetime, in milliseconds.
pub const JWT_EXPIRATION_ENV: &str = "JWT_EXPIRATION_MS";

pub const USER_SERVICE_URL_ENV: &str = "USER_SERVICE_URL";
pub const RECIPE_SERVICE_URL_ENV: &str = "RECIPE_SERVICE_URL";
pub const ROUTE_RULES_FILE_ENV: &str = "ROUTE_RULES_FILE";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Seed user for the development login endpoint (`username:email:password`).
pub const DEV_SEED_USER_ENV: &str = "DEV_SEED_USER";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
/// One day.
pub const DEFAULT_TOKEN_TTL_MS: i64 = 86_400_000;
/// Lifetimes shorter than a second cannot survive whole-second timestamps.
pub const MIN_TOKEN_TTL_MS: i64 = 1_000;
pub const DEFAULT_USER_SERVICE_URL: &str = "http://127.0.0.1:8081";
pub const DEFAULT_RECIPE_SERVICE_URL: &str = "http://127.0.0.1:8082";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Configuration errors. Any of them aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("JWT_SECRET_KEY: {0}")]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error("failed to build upstream HTTP client: {0}")]
    HttpClient(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// PEM certificate chain and private key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Everything the gateway reads from its environment.
#[derive(Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    /// Decoded signing secret.
    pub signing_secret: Vec<u8>,
    pub token_ttl: TimeDelta,
    pub upstreams: Vec<UpstreamRoute>,
    /// Rules added after the canonical table.
    pub route_rules: Vec<RouteRule>,
    pub upstream_timeout: Duration,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("signing_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("upstreams", &self.upstreams)
            .field("route_rules", &self.route_rules.len())
            .field("upstream_timeout", &self.upstream_timeout)
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl GatewayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host: IpAddr = parse_or(var(HOST_ENV), HOST_ENV, DEFAULT_HOST.parse().ok())?;
        let port: u16 = parse_or(var(PORT_ENV), PORT_ENV, Some(DEFAULT_PORT))?;

        let secret = var(JWT_SECRET_ENV).ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let signing_secret = decode_secret(&secret)?;
        if signing_secret.len() < MIN_SECRET_LEN {
            return Err(SecretError::TooShort(signing_secret.len()).into());
        }

        let ttl_ms: i64 = parse_or(
            var(JWT_EXPIRATION_ENV),
            JWT_EXPIRATION_ENV,
            Some(DEFAULT_TOKEN_TTL_MS),
        )?;
        if ttl_ms < MIN_TOKEN_TTL_MS {
            return Err(ConfigError::Invalid {
                name: JWT_EXPIRATION_ENV,
                reason: format!("must be at least {MIN_TOKEN_TTL_MS}"),
            });
        }

        let user_service = upstream_url(
            var(USER_SERVICE_URL_ENV).as_deref(),
            USER_SERVICE_URL_ENV,
            DEFAULT_USER_SERVICE_URL,
        )?;
        let recipe_service = upstream_url(
            var(RECIPE_SERVICE_URL_ENV).as_deref(),
            RECIPE_SERVICE_URL_ENV,
            DEFAULT_RECIPE_SERVICE_URL,
        )?;
        let upstreams = vec![
            UpstreamRoute::new("user-service", "/api/auth", user_service.clone()),
            UpstreamRoute::new("user-service", "/api/users", user_service),
            UpstreamRoute::new("recipe-service", "/api/recipes", recipe_service.clone()),
            UpstreamRoute::new("recipe-service", "/api/ai", recipe_service),
        ];

        let route_rules = match var(ROUTE_RULES_FILE_ENV) {
            Some(path) => load_rules(Path::new(&path))?,
            None => Vec::new(),
        };

        let timeout_secs: u64 = parse_or(
            var(UPSTREAM_TIMEOUT_ENV),
            UPSTREAM_TIMEOUT_ENV,
            Some(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: UPSTREAM_TIMEOUT_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Invalid {
                    name: TLS_KEY_PATH_ENV,
                    reason: format!("required when {TLS_CERT_PATH_ENV} is set"),
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Invalid {
                    name: TLS_CERT_PATH_ENV,
                    reason: format!("required when {TLS_KEY_PATH_ENV} is set"),
                })
            }
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            signing_secret,
            token_ttl: TimeDelta::milliseconds(ttl_ms),
            upstreams,
            route_rules,
            upstream_timeout: Duration::from_secs(timeout_secs),
            tls,
            log_format,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}

fn upstream_url(value: Option<&str>, name: &'static str, default: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.unwrap_or(default)).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Invalid {
            name,
            reason: "expected an http(s) URL with a host".to_string(),
        });
    }
    Ok(url)
}
