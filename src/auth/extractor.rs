// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for services that sit behind the edge.
//!
//! The verified identity is an explicit handler argument, never ambient
//! state:
//!
//! ```rust,ignore
//! async fn follow(ForwardedIdentity(user_id): ForwardedIdentity) -> impl IntoResponse {
//!     // user_id is the durable identifier the edge verified
//! }
//!
//! async fn rate(Auth(identity): Auth, State(state): State<RecipeState>) -> impl IntoResponse {
//!     // token verified in-process (TokenVerifier: FromRef<RecipeState>)
//! }
//! ```

use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::identity::Identity;
use super::middleware::{bearer_token, USER_ID_HEADER};
use super::verifier::TokenVerifier;
use super::AuthError;

/// The durable identifier asserted by the edge in `X-User-ID`.
///
/// Only trustworthy when the service is unreachable except through the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedIdentity(pub String);

impl<S> FromRequestParts<S> for ForwardedIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AuthError::MissingCredential)?
            .to_str()
            .map_err(|_| AuthError::MissingCredential)?
            .trim();

        if user_id.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        Ok(ForwardedIdentity(user_id.to_string()))
    }
}

/// Identity from a bearer token verified in-process.
///
/// Prefers an [`Identity`] already placed in the request extensions by the
/// edge middleware; otherwise verifies `Authorization: Bearer <token>` with
/// the state's [`TokenVerifier`].
#[derive(Debug, Clone)]
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(Auth(identity));
        }

        let token = bearer_token(&parts.headers)?;
        let identity = TokenVerifier::from_ref(state).verify(token)?;
        Ok(Auth(identity))
    }
}

/// Optional authentication extractor.
///
/// `None` when no valid identity is present; never rejects.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(identity)) => Ok(OptionalAuth(Some(identity))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}
