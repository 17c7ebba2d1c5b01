// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stateless token verification.
//!
//! Verification needs nothing but the shared secret: no session store, no
//! database lookup, no cache. It is safe to run on every request at the edge
//! and, independently, inside services that accept tokens directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::codec::{CodecError, TokenCodec};
use super::identity::{Identity, USER_ID_CLAIM};

/// Why a token was not accepted.
///
/// Every variant means "unauthenticated" to callers. The variant exists for
/// logs and diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("token has expired")]
    Expired,
    #[error("token carries no usable `userId` claim")]
    MissingClaim,
}

impl VerifyError {
    /// Malformed or forged input, as opposed to a merely stale or incomplete token.
    pub fn is_suspicious(&self) -> bool {
        matches!(self, VerifyError::Codec(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            VerifyError::Codec(CodecError::InvalidSignature) => "invalid_signature",
            VerifyError::Codec(_) => "malformed_token",
            VerifyError::Expired => "token_expired",
            VerifyError::MissingClaim => "missing_claim",
        }
    }
}

/// Validates signature, expiry and the durable identity claim.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    codec: Arc<TokenCodec>,
}

impl TokenVerifier {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Verify against the current wall clock.
    pub fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify as of `now`. A token is live only while `now < expires_at`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, VerifyError> {
        let contents = self.codec.decode(token)?;

        if contents.expires_at <= now {
            return Err(VerifyError::Expired);
        }

        let user_id = contents
            .claims
            .get(USER_ID_CLAIM)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(VerifyError::MissingClaim)?;

        Ok(Identity {
            user_id: user_id.to_string(),
            username: contents.subject,
            issued_at: contents.issued_at,
            expires_at: contents.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::CustomClaims;
    use crate::auth::test_support::{codec, codec_with_seed};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn token_with(claims: CustomClaims, iat: i64, exp: i64) -> String {
        codec().encode(&claims, "alice", at(iat), at(exp)).unwrap()
    }

    fn user_claims(user_id: serde_json::Value) -> CustomClaims {
        let mut claims = CustomClaims::new();
        claims.insert(USER_ID_CLAIM.to_string(), user_id);
        claims
    }

    #[test]
    fn live_token_yields_identity() {
        let verifier = TokenVerifier::new(Arc::new(codec()));
        let token = token_with(user_claims(json!("u-42")), 1_000, 2_000);

        let identity = verifier.verify_at(&token, at(1_500)).unwrap();
        assert_eq!(identity.user_id, "u-42");
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.issued_at, at(1_000));
        assert_eq!(identity.expires_at, at(2_000));
    }

    #[test]
    fn expiry_instant_itself_is_rejected() {
        let verifier = TokenVerifier::new(Arc::new(codec()));
        let token = token_with(user_claims(json!("u-42")), 1_000, 2_000);

        assert!(verifier.verify_at(&token, at(1_999)).is_ok());
        assert_eq!(verifier.verify_at(&token, at(2_000)), Err(VerifyError::Expired));
        assert_eq!(verifier.verify_at(&token, at(9_999)), Err(VerifyError::Expired));
    }

    #[test]
    fn missing_or_unusable_user_id_is_rejected() {
        let verifier = TokenVerifier::new(Arc::new(codec()));
        for claims in [
            CustomClaims::new(),
            user_claims(json!("")),
            user_claims(json!(42)),
            user_claims(json!(null)),
        ] {
            let token = token_with(claims, 1_000, 2_000);
            assert_eq!(
                verifier.verify_at(&token, at(1_500)),
                Err(VerifyError::MissingClaim)
            );
        }
    }

    #[test]
    fn foreign_secret_is_suspicious() {
        let verifier = TokenVerifier::new(Arc::new(codec_with_seed(9)));
        let token = token_with(user_claims(json!("u-42")), 1_000, 2_000);

        let err = verifier.verify_at(&token, at(1_500)).unwrap_err();
        assert_eq!(err, VerifyError::Codec(CodecError::InvalidSignature));
        assert!(err.is_suspicious());
        assert_eq!(err.error_code(), "invalid_signature");
    }

    #[test]
    fn arbitrary_strings_never_verify() {
        let verifier = TokenVerifier::new(Arc::new(codec()));
        for input in ["", " ", "Bearer", "x.y", "x.y.z", "eyJhbGciOiJIUzI1NiJ9..", "\u{0}"] {
            let err = verifier.verify(input).unwrap_err();
            assert!(err.is_suspicious(), "input {input:?} gave {err:?}");
        }
    }

    #[test]
    fn expired_is_not_suspicious() {
        assert!(!VerifyError::Expired.is_suspicious());
        assert!(!VerifyError::MissingClaim.is_suspicious());
    }
}
