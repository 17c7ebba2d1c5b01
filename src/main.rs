// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match edge_gateway::server::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be installed yet (configuration errors).
            eprintln!("edge-gateway: {e}");
            tracing::error!(error = %e, "edge gateway exited with error");
            ExitCode::FAILURE
        }
    }
}
