// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process entry point: configuration, logging, serving and shutdown.
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown: the
//! signal task cancels the token, the serve task drains in-flight requests
//! through the `axum-server` handle.

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{router, LoginState};
use crate::config::{ConfigError, GatewayConfig};
use crate::logging;
use crate::state::AppState;

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to load TLS certificate or key: {0}")]
    Tls(std::io::Error),
    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Load configuration from the environment and serve until shutdown.
pub async fn run() -> Result<(), ServerError> {
    let config = GatewayConfig::from_env()?;
    logging::init(config.log_format);

    let state = AppState::from_config(&config)?;
    let login = dev_login(&state)?;

    for upstream in state.proxy.upstreams() {
        info!(prefix = %upstream.prefix, upstream = %upstream.name, base_url = %upstream.base_url, "upstream route");
    }
    info!(
        rules = state.edge.classifier.rules().len(),
        token_ttl_secs = config.token_ttl.num_seconds(),
        "edge authentication configured"
    );

    let app = router(state, login);

    let shutdown = CancellationToken::new();
    let handle = Handle::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });
    tokio::spawn({
        let shutdown = shutdown.clone();
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            info!("shutdown requested, draining connections");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    match &config.tls {
        Some(tls) => {
            // A provider may already be installed; either way one is available.
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(ServerError::Tls)?;

            info!(addr = %config.bind_addr, "edge gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(config.bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        None => {
            info!(addr = %config.bind_addr, "edge gateway listening on http (docs at /docs)");
            axum_server::bind(config.bind_addr)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
    }

    info!("edge gateway stopped");
    Ok(())
}

/// Local login backed by a seeded in-memory store, development builds only.
#[cfg(feature = "dev")]
fn dev_login(state: &AppState) -> Result<Option<LoginState>, ConfigError> {
    use std::sync::Arc;

    use crate::config::DEV_SEED_USER_ENV;
    use crate::store::InMemoryCredentialStore;

    let Ok(seed) = std::env::var(DEV_SEED_USER_ENV) else {
        return Ok(None);
    };
    let store = InMemoryCredentialStore::from_seed(&seed)?;
    tracing::warn!("development login endpoint enabled at /api/auth/login; never use in production");
    Ok(Some(LoginState::new(Arc::new(store), state.issuer())))
}

#[cfg(not(feature = "dev"))]
fn dev_login(_state: &AppState) -> Result<Option<LoginState>, ConfigError> {
    Ok(None)
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
