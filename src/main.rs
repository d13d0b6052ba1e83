//! marketsync-gateway server entry point.
//!
//! Starts the Axum HTTP server and the sync scheduler, and shuts both down
//! on Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use marketsync_gateway::api;
use marketsync_gateway::app_state::AppState;
use marketsync_gateway::config::{GatewayConfig, LogFormat};
use marketsync_gateway::persistence::{InMemoryOutcomeLog, OutcomeLog, PostgresOutcomeLog};
use marketsync_gateway::service::{LoggingProcessor, UnconfiguredSync};

/// How long to wait for the dispatch queue to drain at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting marketsync-gateway");

    // Outcome Log
    let outcome_log: Arc<dyn OutcomeLog> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to PostgreSQL")?;
        let log = PostgresOutcomeLog::new(pool);
        log.migrate().await.context("applying migrations")?;
        tracing::info!("outcome log backed by PostgreSQL");
        Arc::new(log)
    } else {
        tracing::info!(
            capacity = config.outcome_log_capacity,
            "outcome log kept in memory"
        );
        Arc::new(InMemoryOutcomeLog::new(config.outcome_log_capacity))
    };

    // No marketplace client is wired in this binary; runs fail visibly.
    let listen_addr = config.listen_addr;
    let (app_state, dispatch_worker) = AppState::new(
        config,
        outcome_log,
        Arc::new(UnconfiguredSync),
        Arc::new(LoggingProcessor),
    );

    // Scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(app_state.scheduler.clone().run(shutdown_rx));

    // Start server
    let app = api::build_router(app_state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    // Stop scheduling and let running jobs finish
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "scheduler task failed");
    }

    // The router is gone, so the queue closes once drained
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatch_worker)
        .await
        .is_err()
    {
        tracing::warn!("dispatch queue did not drain before shutdown");
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
