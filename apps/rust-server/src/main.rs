// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use guardian_rust_server::{
    api::router,
    config::{LogFormat, ServiceConfig},
    state::AppState,
};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    let state = AppState::build(&config).expect("Failed to initialize application state");

    // Background sweeper for time locks
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(Arc::clone(&state.timelocks).run(shutdown.clone()));

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    let server = async {
        match &config.tls {
            Some(tls) => {
                // Install the ring crypto provider for rustls (must be done before any TLS operations)
                rustls::crypto::ring::default_provider()
                    .install_default()
                    .expect("Failed to install rustls crypto provider");
                let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                    .await
                    .expect("Failed to load TLS certificate and key");
                info!(%addr, "GuardianLayer listening on https (docs at /docs)");
                axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await
            }
            None => {
                info!(%addr, "GuardianLayer listening on http (docs at /docs)");
                axum_server::bind(addr)
                    .serve(app.into_make_service())
                    .await
            }
        }
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "Server failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "Time-lock sweeper panicked");
    }
}
