//! qadash -- test automation dashboard.
//!
//! This crate aggregates test-execution logs into pass/fail metrics and
//! launches test scripts on demand, exposing both through a JSON HTTP API.

pub mod api;
pub mod config;
pub mod discovery;
pub mod execution;
pub mod logs;
pub mod metrics;

use anyhow::{Context, Result};

use crate::config::Config;

/// Start the qadash HTTP server and run until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Make sure the scanned directories exist
    for dir in [&config.paths.log_dir, &config.paths.test_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    tracing::info!(
        log_dir = %config.paths.log_dir.display(),
        test_dir = %config.paths.test_dir.display(),
        "Using directories"
    );

    // 2. Shared state: execution registry + runner
    let state = api::state::AppState::new(&config);
    let app = api::router(state);

    // 3. Start API Server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(%addr, "qadash listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("qadash stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
