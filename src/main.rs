use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use wardline::app::{self, AppState};
use wardline::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let state = AppState::from_config(&config);

    state
        .db
        .init_db(config.bcrypt_cost)
        .with_context(|| format!("Failed to initialize {}", config.database.display()))?;
    let purged = state.db.purge_expired_sessions(OffsetDateTime::now_utc())?;
    if purged > 0 {
        tracing::info!(purged, "removed expired sessions");
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(
        addr = %config.bind,
        database = %config.database.display(),
        uploads = %config.upload_dir.display(),
        "wardline listening"
    );

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
}
