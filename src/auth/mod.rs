// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Edge authentication and identity propagation.
//!
//! ## Auth Flow
//!
//! 1. A client logs in through the user service and receives a signed token
//!    (see [`TokenIssuer`])
//! 2. The client sends `Authorization: Bearer <token>` on every request
//! 3. The edge:
//!    - Strips any client-supplied `X-User-ID` header
//!    - Normalizes the path and classifies it as public or protected
//!    - On protected routes verifies signature, expiry and the `userId` claim
//!    - Forwards the request with `X-User-ID: <userId>`
//!
//! ## Security
//!
//! - Unknown routes are protected
//! - HS256 only; the shared secret must decode to at least 32 bytes
//! - Every rejection is an empty `401`; the reason is only logged
//! - No revocation: a token stays valid until `exp` unless the secret rotates

pub mod codec;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod issuer;
pub mod middleware;
pub mod routes;
pub mod verifier;

pub use codec::{CodecError, SecretError, TokenCodec};
pub use error::AuthError;
pub use extractor::{Auth, ForwardedIdentity, OptionalAuth};
pub use identity::{Identity, Principal, USER_ID_CLAIM};
pub use issuer::{IssuedToken, TokenIssuer};
pub use middleware::{edge_auth, EdgeAuth, USER_ID_HEADER};
pub use routes::{Access, RouteClassifier, RouteRule};
pub use verifier::{TokenVerifier, VerifyError};
