// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification for the login endpoint.
//!
//! Account storage belongs to the identity service; the gateway only talks to
//! it through [`CredentialStore`]. The in-memory implementation exists for
//! development builds and tests and keeps Argon2id password hashes in PHC
//! format.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::config::{ConfigError, DEV_SEED_USER_ENV};

/// Why a login attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Unknown identifier or wrong password; callers cannot tell which.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a login identifier (username or email) and password to a principal.
pub trait CredentialStore: Send + Sync {
    fn authenticate(&self, identifier: &str, password: &str) -> Result<Principal, CredentialError>;
}

struct StoredUser {
    user_id: Uuid,
    username: String,
    email: String,
    password_hash: String,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: HashMap<String, StoredUser>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `username:email:password` into a store holding one user.
    ///
    /// The password is everything after the second colon.
    pub fn from_seed(seed: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: DEV_SEED_USER_ENV,
            reason: reason.to_string(),
        };

        let mut fields = seed.splitn(3, ':');
        let (Some(username), Some(email), Some(password)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid("expected username:email:password"));
        };
        if username.is_empty() || password.is_empty() || !email.contains('@') {
            return Err(invalid("username, email and password are all required"));
        }

        let mut store = Self::new();
        store
            .insert_user(username, email, password)
            .map_err(|e| invalid(&e.to_string()))?;
        Ok(store)
    }

    /// Add or replace a user, keyed by username.
    pub fn insert_user(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, CredentialError> {
        let user_id = Uuid::new_v4();
        let user = StoredUser {
            user_id,
            username: username.to_string(),
            email: email.to_lowercase(),
            password_hash: hash_password(password)?,
        };
        self.users.insert(username.to_string(), user);
        Ok(Principal::new(user_id.to_string(), username))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn find(&self, identifier: &str) -> Option<&StoredUser> {
        self.users.get(identifier).or_else(|| {
            let email = identifier.to_lowercase();
            self.users.values().find(|user| user.email == email)
        })
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn authenticate(&self, identifier: &str, password: &str) -> Result<Principal, CredentialError> {
        let Some(user) = self.find(identifier.trim()) else {
            // Same work as a real comparison.
            let _ = hash_password(password);
            return Err(CredentialError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(CredentialError::InvalidCredentials);
        }
        Ok(Principal::new(user.user_id.to_string(), user.username.clone()))
    }
}

/// Argon2id with default parameters and a random salt, PHC encoded.
fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Unavailable(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| CredentialError::Unavailable(format!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
