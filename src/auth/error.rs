// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Internally every failure keeps its reason for logging. Externally all of
//! them collapse to the same response: `401` with an empty body, so a caller
//! cannot use the edge as a token-validation oracle.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use super::verifier::VerifyError;

/// Authentication failure at the edge or in an identity extractor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No authorization header, or one not in `Bearer <token>` form
    #[error("bearer credential is missing or malformed")]
    MissingCredential,
    /// The token was presented but did not verify
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] VerifyError),
    /// The verified identity cannot be carried in the forwarded header
    #[error("verified identity cannot be forwarded as a header")]
    UnforwardableIdentity,
}

impl AuthError {
    /// Get the diagnostic code for this error (logs only, never sent).
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::Unauthenticated(reason) => reason.error_code(),
            AuthError::UnforwardableIdentity => "unforwardable_identity",
        }
    }

    /// Forged or garbled input, worth a louder log line.
    pub fn is_suspicious(&self) -> bool {
        match self {
            AuthError::Unauthenticated(reason) => reason.is_suspicious(),
            AuthError::UnforwardableIdentity => true,
            AuthError::MissingCredential => false,
        }
    }

    /// Every authentication failure is a 401; the edge never answers 403.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::CodecError;
    use axum::body::to_bytes;

    fn all_kinds() -> Vec<AuthError> {
        vec![
            AuthError::MissingCredential,
            AuthError::Unauthenticated(VerifyError::Codec(CodecError::Malformed)),
            AuthError::Unauthenticated(VerifyError::Codec(CodecError::InvalidSignature)),
            AuthError::Unauthenticated(VerifyError::Expired),
            AuthError::Unauthenticated(VerifyError::MissingClaim),
            AuthError::UnforwardableIdentity,
        ]
    }

    #[tokio::test]
    async fn every_kind_is_an_empty_401() {
        for err in all_kinds() {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(body.is_empty());
        }
    }

    #[test]
    fn reasons_stay_distinguishable_internally() {
        let codes: Vec<_> = all_kinds().iter().map(AuthError::error_code).collect();
        assert_eq!(
            codes,
            [
                "missing_credential",
                "malformed_token",
                "invalid_signature",
                "token_expired",
                "missing_claim",
                "unforwardable_identity",
            ]
        );
    }

    #[test]
    fn only_forgery_is_suspicious() {
        assert!(!AuthError::MissingCredential.is_suspicious());
        assert!(!AuthError::Unauthenticated(VerifyError::Expired).is_suspicious());
        assert!(
            AuthError::Unauthenticated(VerifyError::Codec(CodecError::InvalidSignature))
                .is_suspicious()
        );
    }
}
