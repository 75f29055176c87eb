// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use axum_server::tls_rustls::RustlsConfig;
use tracing::{error, info, warn};

use relational_auth_gateway::{
    api::router,
    config::GatewayConfig,
    state::AppState,
    telemetry::{init_tracing, LogFormat},
};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration, refusing to start");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to initialise gateway");
            return ExitCode::FAILURE;
        }
    };
    let issuer = state.gate.issuer().to_string();
    let app = router(state);
    let addr = config.bind_addr;

    let served = match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                warn!("rustls crypto provider was already installed");
            }
            let tls_config = match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
                Ok(tls_config) => tls_config,
                Err(e) => {
                    error!(error = %e, cert = %tls.cert.display(), "failed to load TLS certificate");
                    return ExitCode::FAILURE;
                }
            };
            info!(%addr, backend = ?config.backend, issuer = %issuer, "auth gateway listening on https");
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!(%addr, backend = ?config.backend, issuer = %issuer, "auth gateway listening on http");
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
        }
    };

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
