//! KeyShare Server: shared account access with per-account seat limits.
//!
//! Opens the snapshot store, runs the reconciliation sweeper, and waits
//! for a shutdown signal.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use keyshare_auth::seat::ReconciliationSweeper;
use keyshare_core::config::AppConfig;
use keyshare_core::error::AppError;
use keyshare_worker::SweepRunner;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("KEYSHARE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("KEYSHARE_ENV").ok();

    AppConfig::load(&config_path, env.as_deref())
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
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting KeyShare");

    // ── Step 1: Open (or bootstrap) the store ────────────────────
    let store = keyshare_service::open_store(&config).await?;

    // ── Step 2: Start the sweeper ────────────────────────────────
    let sweeper = if config.sweeper.enabled {
        let sweeper =
            ReconciliationSweeper::from_config(store.clone(), &config.session, &config.sweeper);
        Some(SweepRunner::from_config(Arc::new(sweeper), &config.sweeper).start())
    } else {
        tracing::warn!("Sweeper disabled; stale sessions will only be ended on heartbeat");
        None
    };

    tracing::info!(
        inactivity_timeout_seconds = config.session.inactivity_timeout_seconds,
        "KeyShare ready"
    );

    // ── Step 3: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    if let Some(handle) = sweeper {
        handle.stop().await;
    }

    tracing::info!("KeyShare shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
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
