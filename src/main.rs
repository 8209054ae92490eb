// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use blog_platform_server::{
    api::router,
    config::AppConfig,
    events::{mailer::Mailer, EventPublisher, NotificationListener},
    state::AppState,
    storage::{CircuitBreaker, Store},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.uses_development_secret() {
        warn!("Using the built-in development JWT secret; set BLOG_JWT_SECRET in production");
    }

    let breaker = Arc::new(CircuitBreaker::new(config.breaker_config()));
    if config.maintenance_mode {
        warn!("Maintenance mode: database circuit breaker forced open");
        breaker.force_open();
    }
    let store = Arc::new(
        Store::open(&config.database_path(), breaker).context("Failed to open database")?,
    );

    let shutdown = CancellationToken::new();
    let (events, rx) = EventPublisher::channel();
    let mailer = Mailer::from_settings(&config.mail_api_key, &config.mail_from);
    let listener_task = tokio::spawn(NotificationListener::new(rx, mailer).run(shutdown.clone()));

    let state = AppState::new(&config, store, events).context("Invalid authentication settings")?;
    let app = router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Blog platform server listening (docs at /docs)");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Err(e) = listener_task.await {
        warn!(error = %e, "Notification listener ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM and cancels background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
    shutdown.cancel();
}
