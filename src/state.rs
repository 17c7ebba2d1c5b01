// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::TimeDelta;

use crate::auth::{EdgeAuth, RouteClassifier, TokenCodec, TokenIssuer, TokenVerifier};
use crate::config::{ConfigError, GatewayConfig};
use crate::proxy::UpstreamProxy;

/// Shared, read-only state of the gateway. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub edge: EdgeAuth,
    pub proxy: Arc<UpstreamProxy>,
    pub codec: Arc<TokenCodec>,
    pub token_ttl: TimeDelta,
}

impl AppState {
    pub fn new(edge: EdgeAuth, proxy: UpstreamProxy, codec: Arc<TokenCodec>, token_ttl: TimeDelta) -> Self {
        Self {
            edge,
            proxy: Arc::new(proxy),
            codec,
            token_ttl,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let codec = Arc::new(TokenCodec::from_secret_bytes(&config.signing_secret)?);
        let classifier = RouteClassifier::with_extra(config.route_rules.clone())?;
        let edge = EdgeAuth::new(classifier, TokenVerifier::new(codec.clone()));
        let scheme = if config.tls.is_some() { "https" } else { "http" };
        let proxy = UpstreamProxy::new(config.upstreams.clone(), config.upstream_timeout)?
            .with_forwarded_proto(scheme);

        Ok(Self::new(edge, proxy, codec, config.token_ttl))
    }

    /// Issuer sharing this gateway's secret and lifetime.
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.codec.clone(), self.token_ttl)
    }
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.edge.verifier.clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::test_support::TEST_SECRET_B64;
    use crate::config::{
        JWT_SECRET_ENV, RECIPE_SERVICE_URL_ENV, UPSTREAM_TIMEOUT_ENV, USER_SERVICE_URL_ENV,
    };

    /// Base URL of a local port nothing listens on.
    pub fn unreachable_base() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    }

    /// State with both upstreams pointing at `base`.
    pub fn state_with_upstream(base: &str) -> AppState {
        let config = GatewayConfig::from_lookup(|name| match name {
            JWT_SECRET_ENV => Some(TEST_SECRET_B64.to_string()),
            USER_SERVICE_URL_ENV | RECIPE_SERVICE_URL_ENV => Some(base.to_string()),
            UPSTREAM_TIMEOUT_ENV => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::from_config(&config).unwrap()
    }
}
