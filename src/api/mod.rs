// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Request, State},
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{auth::edge_auth, state::AppState};

pub mod auth;
pub mod health;

pub use auth::LoginState;

/// Build the gateway router.
///
/// Local routes are health and docs, plus `POST /api/auth/login` when `login`
/// is given. Everything else falls through to the upstream proxy. The edge
/// filter wraps the whole router and runs before routing, so local routes are
/// matched on the normalized path too.
pub fn router(state: AppState, login: Option<LoginState>) -> Router {
    let edge = state.edge.clone();

    let mut routes = Router::new()
        .route("/actuator/health", get(health::readiness))
        .route("/actuator/health/liveness", get(health::liveness));

    if let Some(login) = login {
        // other methods on the login path still belong to the identity service
        routes = routes.route(
            "/api/auth/login",
            post(auth::login).with_state(login).fallback(forward),
        );
    }

    let routes = routes
        .fallback(forward)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    Router::new()
        .fallback_service(routes)
        .layer(middleware::from_fn_with_state(edge, edge_auth))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn forward(State(state): State<AppState>, request: Request) -> Response {
    state.proxy.forward(request).await
}

#[derive(OpenApi)]
#[openapi(
    paths(health::readiness, health::liveness, auth::login),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            auth::LoginRequest,
            auth::LoginResponse
        )
    ),
    tags(
        (name = "Health", description = "Gateway and upstream health"),
        (name = "Auth", description = "Token issuance")
    )
)]
struct ApiDoc;
