// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end edge behavior against a mock upstream service.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header::AUTHORIZATION, Method, StatusCode},
    Json, Router,
};
use chrono::{TimeDelta, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use edge_gateway::{
    api::router,
    auth::{codec::CustomClaims, Principal, TokenCodec, USER_ID_CLAIM},
    config::GatewayConfig,
    state::AppState,
};

/// Base64 of `edge-gateway-test-signing-secret`.
const SECRET_B64: &str = "ZWRnZS1nYXRld2F5LXRlc3Qtc2lnbmluZy1zZWNyZXQ=";

/// Echoes what the upstream received, including the identity header.
async fn upstream_echo(request: Request) -> Json<Value> {
    let user_id = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({
        "method": request.method().as_str(),
        "uri": request.uri().to_string(),
        "userId": user_id,
    }))
}

async fn spawn_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(upstream_echo))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

struct Harness {
    app: Router,
    state: AppState,
}

impl Harness {
    async fn start() -> Self {
        let base = spawn_upstream().await;
        let config = GatewayConfig::from_lookup(|name| match name {
            "JWT_SECRET_KEY" => Some(SECRET_B64.to_string()),
            "USER_SERVICE_URL" | "RECIPE_SERVICE_URL" => Some(base.clone()),
            "UPSTREAM_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::from_config(&config).unwrap();
        Self {
            app: router(state.clone(), None),
            state,
        }
    }

    fn token_for(&self, user_id: &str) -> String {
        self.state
            .issuer()
            .issue(&Principal::new(user_id, "alice"))
            .unwrap()
            .token
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Option<Value>) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = (!body.is_empty()).then(|| serde_json::from_slice(&body).unwrap());
        (status, json)
    }
}

fn user_claims(user_id: &str) -> CustomClaims {
    let mut claims = CustomClaims::new();
    claims.insert(USER_ID_CLAIM.to_string(), json!(user_id));
    claims
}

#[tokio::test]
async fn public_listing_is_forwarded_without_identity() {
    let harness = Harness::start().await;
    let (status, body) = harness.send(Method::GET, "/api/recipes", None, &[]).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["uri"], "/api/recipes");
    assert_eq!(body["userId"], Value::Null);
}

#[tokio::test]
async fn protected_write_without_token_is_rejected() {
    let harness = Harness::start().await;
    let (status, body) = harness.send(Method::POST, "/api/recipes", None, &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.is_none());
}

#[tokio::test]
async fn valid_token_is_forwarded_with_user_id() {
    let harness = Harness::start().await;
    let token = harness.token_for("8d3c1f0e-user");
    let (status, body) = harness
        .send(Method::POST, "/api/recipes", Some(&token), &[])
        .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["method"], "POST");
    assert_eq!(body["userId"], "8d3c1f0e-user");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let harness = Harness::start().await;
    let now = Utc::now();
    let token = TokenCodec::from_base64_secret(SECRET_B64)
        .unwrap()
        .encode(
            &user_claims("u-1"),
            "alice",
            now - TimeDelta::hours(2),
            now - TimeDelta::hours(1),
        )
        .unwrap();

    let (status, _) = harness
        .send(Method::POST, "/api/recipes", Some(&token), &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn single_segment_profile_is_public_deeper_paths_are_not() {
    let harness = Harness::start().await;

    let (status, body) = harness.send(Method::GET, "/api/users/alice", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["uri"], "/api/users/alice");

    let (status, _) = harness
        .send(Method::GET, "/api/users/alice/private-settings", None, &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_secret_is_rejected_whatever_the_claims() {
    let harness = Harness::start().await;
    let now = Utc::now();
    let forged = TokenCodec::from_secret_bytes(&[7u8; 32])
        .unwrap()
        .encode(
            &user_claims("admin"),
            "admin",
            now,
            now + TimeDelta::hours(1),
        )
        .unwrap();

    let (status, body) = harness
        .send(Method::POST, "/api/recipes", Some(&forged), &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.is_none());
}

#[tokio::test]
async fn spoofed_identity_header_never_reaches_upstream() {
    let harness = Harness::start().await;

    let (status, body) = harness
        .send(Method::GET, "/api/recipes/42", None, &[("x-user-id", "victim")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["userId"], Value::Null);

    let token = harness.token_for("u-real");
    let (status, body) = harness
        .send(
            Method::POST,
            "/api/recipes/42/rate",
            Some(&token),
            &[("X-User-ID", "victim")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["userId"], "u-real");
}

#[tokio::test]
async fn own_profile_requires_a_token() {
    let harness = Harness::start().await;

    let (status, _) = harness.send(Method::GET, "/api/users/me", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = harness.token_for("u-9");
    let (status, body) = harness
        .send(Method::GET, "/api/users/me", Some(&token), &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["userId"], "u-9");
}

#[tokio::test]
async fn upstream_sees_the_normalized_path() {
    let harness = Harness::start().await;
    let (status, body) = harness
        .send(Method::GET, "/api//recipes/./42/?sort=new", None, &[])
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["uri"], "/api/recipes/42?sort=new");
}

#[tokio::test]
async fn encoded_own_profile_still_requires_a_token() {
    let harness = Harness::start().await;

    for uri in ["/api/users/%6De", "/api/users/m%65", "/api/users/me;x=1"] {
        let (status, body) = harness.send(Method::GET, uri, None, &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body.is_none());
    }

    let token = harness.token_for("u-4");
    let (status, body) = harness
        .send(Method::GET, "/api/users/%6De", Some(&token), &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["uri"], "/api/users/me");
    assert_eq!(body["userId"], "u-4");
}

#[tokio::test]
async fn ambiguous_path_never_reaches_upstream() {
    let harness = Harness::start().await;
    let (status, body) = harness
        .send(Method::GET, "/api/users/alice%2Fsettings", None, &[])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.unwrap().get("uri").is_none());
}

#[tokio::test]
async fn classification_is_stable_under_concurrency() {
    let harness = Arc::new(Harness::start().await);
    let token = harness.token_for("u-5");

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let harness = harness.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let token = (i % 2 == 0).then_some(token);
                harness
                    .send(Method::POST, "/api/ai/analyze-dish", token.as_deref(), &[])
                    .await
                    .0
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let expected = if i % 2 == 0 {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        };
        assert_eq!(task.await.unwrap(), expected);
    }
}
