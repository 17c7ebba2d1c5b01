// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principals and verified identities.

use chrono::{DateTime, Utc};

/// Name of the custom claim carrying the principal's durable identifier.
pub const USER_ID_CLAIM: &str = "userId";

/// A principal as known to the credential store at login time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Durable identifier, stable for the lifetime of the account
    pub user_id: String,
    /// Human-facing username (becomes the token subject)
    pub username: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// Identity extracted from a verified token.
///
/// Built per request, carried in request extensions and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Durable identifier (`userId` claim), forwarded as `X-User-ID`
    pub user_id: String,

    /// Token subject (username at issuance time)
    pub username: String,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}
