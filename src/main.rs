//! TeamHub presence server.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use teamhub_core::clock::{Clock, SystemClock};
use teamhub_core::config::AppConfig;
use teamhub_core::error::{AppError, ErrorKind};
use teamhub_database::repositories::{PresenceSessionRepository, ProjectMemberRepository};
use teamhub_database::store::{PresenceStore, ProjectDirectory};
use teamhub_database::{DatabasePool, migration};
use teamhub_realtime::RealtimeEngine;

#[tokio::main]
async fn main() {
    let env = std::env::var("TEAMHUB_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting TeamHub presence server v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db_pool = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        migration::run_migrations(db_pool.pool()).await?;
    }

    // ── Step 2: Repositories ─────────────────────────────────────
    let store: Arc<dyn PresenceStore> =
        Arc::new(PresenceSessionRepository::new(db_pool.pool().clone()));
    let directory: Arc<dyn ProjectDirectory> =
        Arc::new(ProjectMemberRepository::new(db_pool.pool().clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Step 3: Realtime engine ──────────────────────────────────
    let engine = Arc::new(RealtimeEngine::new(
        config.realtime.clone(),
        config.presence.clone(),
        store,
        directory,
        clock,
    ));

    // ── Step 4: HTTP server ──────────────────────────────────────
    let bind_address = config.server.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let cors = config.server.cors.clone();
    let state = teamhub_api::AppState::new(
        Arc::new(config),
        Arc::clone(&engine),
        Some(db_pool.clone()),
    );
    let app = teamhub_api::build_app(state, &cors);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Failed to bind {bind_address}"),
                e,
            )
        })?;

    // ── Step 5: Graceful shutdown ────────────────────────────────
    let shutdown_engine = Arc::clone(&engine);
    let shutdown = async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, closing presence sessions...");
        match tokio::time::timeout(grace, shutdown_engine.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Realtime engine shutdown failed"),
            Err(_) => tracing::warn!(
                grace_seconds = grace.as_secs(),
                "Realtime engine shutdown timed out"
            ),
        }
    };

    teamhub_api::serve(listener, app, shutdown).await?;

    db_pool.close().await;
    tracing::info!("TeamHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
