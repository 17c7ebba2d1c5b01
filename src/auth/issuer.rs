// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token issuance at login time.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde_json::Value;

use super::codec::{CodecError, CustomClaims, TokenCodec};
use super::identity::{Principal, USER_ID_CLAIM};

/// A freshly signed token and its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs tokens with a deployment-wide TTL.
///
/// The TTL is fixed at construction; every token issued by one deployment
/// carries the same validity window.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    ttl: TimeDelta,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, ttl: TimeDelta) -> Self {
        Self { codec, ttl }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, CodecError> {
        self.issue_at(principal, Utc::now())
    }

    /// Issue as of `now`, truncated to whole seconds like the token itself.
    pub fn issue_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, CodecError> {
        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| CodecError::Encoding("token expiry is out of range".to_string()))?
            .trunc_subsecs(0);

        let mut claims = CustomClaims::new();
        claims.insert(
            USER_ID_CLAIM.to_string(),
            Value::String(principal.user_id.clone()),
        );

        let token = self
            .codec
            .encode(&claims, &principal.username, issued_at, expires_at)?;

        tracing::debug!(
            user_id = %principal.user_id,
            expires_at = %expires_at,
            "issued identity token"
        );

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::codec;
    use crate::auth::verifier::{TokenVerifier, VerifyError};

    fn setup(ttl: TimeDelta) -> (TokenIssuer, TokenVerifier) {
        let codec = Arc::new(codec());
        (
            TokenIssuer::new(codec.clone(), ttl),
            TokenVerifier::new(codec),
        )
    }

    fn alice() -> Principal {
        Principal::new("0b6f3c52-6d0e-4f5e-9a51-3f1f7e0c2a10", "alice")
    }

    #[test]
    fn issued_token_verifies_immediately() {
        let (issuer, verifier) = setup(TimeDelta::hours(24));
        let issued = issuer.issue(&alice()).unwrap();

        let identity = verifier.verify(&issued.token).unwrap();
        assert_eq!(identity.user_id, alice().user_id);
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.expires_at, issued.expires_at);
    }

    #[test]
    fn token_dies_once_ttl_elapses() {
        let (issuer, verifier) = setup(TimeDelta::minutes(15));
        let now = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let issued = issuer.issue_at(&alice(), now).unwrap();

        assert_eq!(issued.issued_at, DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        assert_eq!(issued.expires_at, issued.issued_at + TimeDelta::minutes(15));

        assert!(verifier
            .verify_at(&issued.token, issued.expires_at - TimeDelta::seconds(1))
            .is_ok());
        assert_eq!(
            verifier.verify_at(&issued.token, issued.expires_at + TimeDelta::seconds(1)),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn all_tokens_share_the_configured_window() {
        let (issuer, _) = setup(TimeDelta::seconds(90));
        let now = Utc::now();
        let first = issuer.issue_at(&alice(), now).unwrap();
        let second = issuer
            .issue_at(&Principal::new("u-2", "bob"), now)
            .unwrap();

        assert_eq!(issuer.ttl(), TimeDelta::seconds(90));
        assert_eq!(
            first.expires_at - first.issued_at,
            second.expires_at - second.issued_at
        );
    }

    #[test]
    fn overflowing_expiry_is_an_error() {
        let (issuer, _) = setup(TimeDelta::MAX);
        assert!(matches!(
            issuer.issue(&alice()),
            Err(CodecError::Encoding(_))
        ));
    }
}
