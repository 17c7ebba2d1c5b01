// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::TokenIssuer,
    error::ApiError,
    store::{CredentialError, CredentialStore},
};

/// Collaborators of the login endpoint.
#[derive(Clone)]
pub struct LoginState {
    pub store: Arc<dyn CredentialStore>,
    pub issuer: Arc<TokenIssuer>,
}

impl LoginState {
    pub fn new(store: Arc<dyn CredentialStore>, issuer: TokenIssuer) -> Self {
        Self {
            store,
            issuer: Arc::new(issuer),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Username or email address.
    pub login_identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, body = LoginResponse),
        (status = 400, description = "Identifier or password missing"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<LoginState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.login_identifier.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("loginIdentifier and password are required"));
    }

    let principal = state
        .store
        .authenticate(&request.login_identifier, &request.password)
        .map_err(|e| match e {
            CredentialError::InvalidCredentials => {
                tracing::info!(reason = "invalid_credentials", "login rejected");
                ApiError::unauthorized("Invalid credentials")
            }
            CredentialError::Unavailable(message) => {
                tracing::error!(error = %message, "credential store unavailable");
                ApiError::service_unavailable("Login is temporarily unavailable")
            }
        })?;

    let issued = state.issuer.issue(&principal).map_err(|e| {
        tracing::error!(error = %e, "failed to issue token");
        ApiError::internal("Failed to issue token")
    })?;

    tracing::info!(user_id = %principal.user_id, "login succeeded");

    Ok(Json(LoginResponse {
        token: issued.token,
        username: principal.username,
        expires_at: issued.expires_at,
    }))
}
