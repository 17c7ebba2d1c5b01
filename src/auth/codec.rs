// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed identity token encoding and decoding.
//!
//! Tokens are compact HS256 JWTs carrying the registered `sub`, `iat` and
//! `exp` claims plus any number of flattened custom claims. The HMAC key is
//! derived once from the base64 shared secret and is used for both directions;
//! every process that issues or verifies tokens must be configured with the
//! same secret.
//!
//! Decoding checks structure and signature only. Expiry is the verifier's
//! concern, so an expired but authentic token still decodes.

use base64ct::{Base64, Base64Unpadded, Encoding};
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Minimum decoded secret length for HS256 (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

/// Registered claim names owned by the codec.
const RESERVED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

/// Custom claims carried next to the registered ones.
pub type CustomClaims = Map<String, Value>;

/// Codec-level token failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The string is not a JWT with the expected claim structure.
    #[error("token is malformed")]
    Malformed,
    /// The signature does not verify against the configured secret.
    #[error("token signature is invalid")]
    InvalidSignature,
    /// A custom claim reuses a registered claim name.
    #[error("custom claim `{0}` collides with a registered claim")]
    ReservedClaim(String),
    /// Encoding failed for a reason other than the input claims.
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Errors raised while turning the configured secret into a signing key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("signing secret is not valid base64")]
    InvalidBase64,
    #[error("signing secret must decode to at least 32 bytes (got {0})")]
    TooShort(usize),
}

/// Decoded token contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenContents {
    pub claims: CustomClaims,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct OutgoingClaims<'a> {
    sub: &'a str,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    custom: &'a CustomClaims,
}

#[derive(Deserialize)]
struct IncomingClaims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    custom: CustomClaims,
}

/// Decode a base64 secret as supplied by configuration.
///
/// Padded and unpadded standard base64 are both accepted.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, SecretError> {
    let secret = secret.trim();
    Base64::decode_vec(secret)
        .or_else(|_| Base64Unpadded::decode_vec(secret))
        .map_err(|_| SecretError::InvalidBase64)
}

/// HS256 token codec bound to one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the base64-encoded configuration value.
    pub fn from_base64_secret(secret: &str) -> Result<Self, SecretError> {
        Self::from_secret_bytes(&decode_secret(secret)?)
    }

    /// Build a codec from already-decoded key material.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, SecretError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SecretError::TooShort(secret.len()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Sign a token. Timestamps are truncated to whole seconds.
    pub fn encode(
        &self,
        claims: &CustomClaims,
        subject: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, CodecError> {
        if let Some(name) = RESERVED_CLAIMS.iter().find(|name| claims.contains_key(**name)) {
            return Err(CodecError::ReservedClaim((*name).to_string()));
        }

        let outgoing = OutgoingClaims {
            sub: subject,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            custom: claims,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &outgoing, &self.encoding_key)
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }

    /// Parse and authenticate a token without looking at its expiry.
    pub fn decode(&self, token: &str) -> Result<TokenContents, CodecError> {
        let data = jsonwebtoken::decode::<IncomingClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    CodecError::InvalidSignature
                }
                _ => CodecError::Malformed,
            })?;

        let claims = data.claims;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(CodecError::Malformed)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(CodecError::Malformed)?;

        Ok(TokenContents {
            claims: claims.custom,
            subject: claims.sub,
            issued_at,
            expires_at,
        })
    }
}
