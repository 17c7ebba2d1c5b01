// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upstream proxy.
//!
//! Forwards requests that passed the edge filter to the internal service
//! owning the path prefix. The request reaching this point already carries
//! the normalized path and, on protected routes, the `X-User-ID` header.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use url::Url;

use crate::config::ConfigError;
use crate::error::ApiError;

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Headers scoped to a single connection; never forwarded in either direction.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// A path prefix owned by one internal service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRoute {
    pub name: String,
    pub prefix: String,
    pub base_url: Url,
}

impl UpstreamRoute {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            base_url,
        }
    }

    /// Segment-aware: `/api/users` covers `/api/users/42` but not `/api/usersx`.
    pub fn covers(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Absolute upstream URL for a request path (and query).
    pub fn target(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path_and_query
        )
    }
}

/// Forwards requests to the upstream owning their path.
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    routes: Vec<UpstreamRoute>,
    client: reqwest::Client,
    forwarded_proto: HeaderValue,
}

impl UpstreamProxy {
    /// Build the proxy and its HTTP client.
    ///
    /// Redirects are passed back to the caller, never followed.
    pub fn new(routes: Vec<UpstreamRoute>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            routes,
            client,
            forwarded_proto: HeaderValue::from_static("http"),
        })
    }

    /// Scheme reported to upstreams in `X-Forwarded-Proto`.
    pub fn with_forwarded_proto(mut self, proto: &'static str) -> Self {
        self.forwarded_proto = HeaderValue::from_static(proto);
        self
    }

    pub fn upstreams(&self) -> &[UpstreamRoute] {
        &self.routes
    }

    /// The route with the longest prefix covering `path`.
    pub fn resolve(&self, path: &str) -> Option<&UpstreamRoute> {
        self.routes
            .iter()
            .filter(|route| route.covers(path))
            .max_by_key(|route| route.prefix.len())
    }

    /// Forward a request and relay the upstream response.
    ///
    /// No retries: a failed attempt is reported as `502`, or `504` on timeout.
    pub async fn forward(&self, request: Request) -> Response {
        let Some(route) = self.resolve(request.uri().path()) else {
            return ApiError::not_found("No route for path").into_response();
        };

        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target_url = route.target(path_and_query);

        let body = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, upstream = %route.name, "failed to read request body");
                return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                    .into_response();
            }
        };

        let headers = self.upstream_headers(&parts);

        tracing::debug!(
            method = %parts.method,
            upstream = %route.name,
            target_url = %target_url,
            "forwarding request"
        );

        let mut outgoing = self
            .client
            .request(parts.method.clone(), &target_url)
            .headers(headers);
        if !body.is_empty() {
            outgoing = outgoing.body(body);
        }

        match outgoing.send().await {
            Ok(upstream) => relay(upstream, &route.name).await,
            Err(e) if e.is_timeout() => {
                tracing::error!(error = %e, upstream = %route.name, "upstream timed out");
                ApiError::gateway_timeout("Upstream timed out").into_response()
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    upstream = %route.name,
                    target_url = %target_url,
                    "failed to forward request"
                );
                ApiError::bad_gateway("Upstream unavailable").into_response()
            }
        }
    }

    /// Request headers as the upstream should see them.
    ///
    /// Connection-scoped headers go, the client address is appended to
    /// `X-Forwarded-For`, and `X-Forwarded-Proto`/`-Host` describe this edge.
    fn upstream_headers(&self, parts: &Parts) -> HeaderMap {
        let mut headers = parts.headers.clone();
        strip_hop_by_hop(&mut headers);

        let host = parts
            .headers
            .get(header::HOST)
            .cloned()
            .or_else(|| {
                let authority = parts.uri.authority()?;
                HeaderValue::from_str(authority.as_str()).ok()
            });
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            let client = peer.ip().to_string();
            let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(prior) if !prior.trim().is_empty() => format!("{prior}, {client}"),
                _ => client,
            };
            if let Ok(value) = HeaderValue::from_str(&chain) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }
        headers.insert(X_FORWARDED_PROTO, self.forwarded_proto.clone());
        match host {
            Some(host) => {
                headers.insert(X_FORWARDED_HOST, host);
            }
            None => {
                headers.remove(X_FORWARDED_HOST);
            }
        }
        headers
    }

    /// Whether the upstream answers its own health endpoint.
    pub async fn probe(&self, route: &UpstreamRoute) -> bool {
        let url = route.target("/actuator/health");
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, upstream = %route.name, "health probe failed");
                false
            }
        }
    }
}

/// Remove the fixed hop-by-hop set and every header the `Connection` header names.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(&listed) {
        headers.remove(name);
    }
}

async fn relay(upstream: reqwest::Response, name: &str) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, upstream = %name, "failed to read upstream response");
            return ApiError::bad_gateway("Upstream response was cut short").into_response();
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
