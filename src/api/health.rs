// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the gateway process is running.
    pub service: String,
    /// Upstream service name to "ok" or "unavailable".
    pub upstreams: BTreeMap<String, String>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Probe every distinct upstream once.
async fn check_upstreams(state: &AppState) -> BTreeMap<String, String> {
    let mut distinct: Vec<_> = state.proxy.upstreams().iter().collect();
    distinct.sort_by(|a, b| a.name.cmp(&b.name));
    distinct.dedup_by(|a, b| a.name == b.name);

    let mut checks = BTreeMap::new();
    for route in distinct {
        let status = if state.proxy.probe(route).await {
            "ok"
        } else {
            "unavailable"
        };
        checks.insert(route.name.clone(), status.to_string());
    }
    checks
}

/// Readiness probe handler.
///
/// Returns 200 only if every upstream answers its own health endpoint.
#[utoipa::path(
    get,
    path = "/actuator/health",
    tag = "Health",
    responses(
        (status = 200, description = "Gateway and upstreams are ready", body = ReadyResponse),
        (status = 503, description = "An upstream is unavailable", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let upstreams = check_upstreams(&state).await;
    let all_ok = upstreams.values().all(|status| status == "ok");

    if !all_ok {
        tracing::warn!(?upstreams, "readiness check degraded");
    }

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            upstreams,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/actuator/health/liveness",
    tag = "Health",
    responses(
        (status = 200, description = "Gateway is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
