// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge authentication filter.
//!
//! Runs in front of every route of the gateway, local or proxied:
//!
//! 1. drop any client-supplied `X-User-ID` (only the edge may set it)
//! 2. normalize the path the way the upstream services will read it, and
//!    classify the request (a path with no canonical reading is a `400`)
//! 3. public: forward, attaching the identity if a valid token happens to be present
//! 4. protected: require `Authorization: Bearer <token>`, verify it, set
//!    `X-User-ID` and put the [`Identity`] in the request extensions
//!
//! Every failure ends in exactly one `401` and the request is never forwarded.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::AUTHORIZATION,
        uri::{PathAndQuery, Uri},
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use super::identity::Identity;
use super::routes::{normalize_path, RouteClassifier};
use super::verifier::TokenVerifier;
use super::AuthError;
use crate::error::ApiError;

/// Header carrying the verified principal's durable identifier downstream.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Everything the edge filter needs; immutable after startup.
#[derive(Debug, Clone)]
pub struct EdgeAuth {
    pub classifier: Arc<RouteClassifier>,
    pub verifier: TokenVerifier,
}

impl EdgeAuth {
    pub fn new(classifier: RouteClassifier, verifier: TokenVerifier) -> Self {
        Self {
            classifier: Arc::new(classifier),
            verifier,
        }
    }

    /// Verify the bearer credential of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = bearer_token(headers)?;
        Ok(self.verifier.verify(token)?)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MissingCredential)?
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredential)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Authentication middleware for the edge router.
///
/// Install with `axum::middleware::from_fn_with_state(edge, edge_auth)`.
pub async fn edge_auth(
    State(edge): State<EdgeAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    request.headers_mut().remove(&USER_ID_HEADER);

    let path = match normalize_path(request.uri().path()) {
        Ok(path) => path,
        Err(err) => {
            warn!(method = %request.method(), error = %err, "refused ambiguous request path");
            return ApiError::bad_request("Invalid request path").into_response();
        }
    };
    if path != request.uri().path() {
        match with_path(request.uri(), &path) {
            Some(uri) => *request.uri_mut() = uri,
            None => return ApiError::bad_request("Invalid request path").into_response(),
        }
    }

    let method = request.method().clone();

    if edge.classifier.is_public(&method, &path) {
        // A caller that is already authenticated keeps its identity on public routes.
        if let Ok(identity) = edge.authenticate(request.headers()) {
            if attach_identity(&mut request, identity).is_err() {
                debug!(%method, %path, "dropping unforwardable identity on public route");
            }
        }
        debug!(%method, %path, "public route");
        return next.run(request).await;
    }

    let outcome = edge
        .authenticate(request.headers())
        .and_then(|identity| attach_identity(&mut request, identity));

    match outcome {
        Ok(user_id) => {
            debug!(%method, %path, %user_id, "authenticated request");
            next.run(request).await
        }
        Err(err) => {
            if err.is_suspicious() {
                warn!(%method, %path, reason = err.error_code(), "rejected request");
            } else {
                info!(%method, %path, reason = err.error_code(), "rejected request");
            }
            err.into_response()
        }
    }
}

/// Set `X-User-ID` and stash the identity for in-process handlers.
fn attach_identity(request: &mut Request, identity: Identity) -> Result<String, AuthError> {
    let value =
        HeaderValue::from_str(&identity.user_id).map_err(|_| AuthError::UnforwardableIdentity)?;
    let user_id = identity.user_id.clone();
    request.headers_mut().insert(USER_ID_HEADER, value);
    request.extensions_mut().insert(identity);
    Ok(user_id)
}

/// Same URI with the path replaced and the query kept.
fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}
