//! # guild-api: Binary Entry Point
//!
//! Starts the Axum HTTP server on `PORT` (default 8080). Configuration is
//! read from the environment; see [`guild_api::config`].

use std::sync::Arc;

use guild_api::config::{AppConfig, LogFormat};
use guild_api::db::{PgActivityLog, PgLedgerStore};
use guild_api::state::AppState;
use guild_settlement::{Activity, LedgerStore, MemoryLedgerStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let db_pool = guild_api::db::init_pool(config.database_url.as_deref().map(String::as_str))
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let (store, activity): (Arc<dyn LedgerStore>, Activity) = match &db_pool {
        Some(pool) => (
            Arc::new(PgLedgerStore::new(pool.clone())),
            Activity::new(Arc::new(PgActivityLog::new(pool.clone()))),
        ),
        None => (Arc::new(MemoryLedgerStore::new()), Activity::in_memory()),
    };

    let port = config.port;
    let (state, _worker) = AppState::new(config, store, activity, db_pool).map_err(|e| {
        tracing::error!("Oracle initialization failed: {e}");
        e
    })?;

    // Attempts submitted before a crash are still waiting for a score.
    let recovered = state.recover().await?;
    if recovered > 0 {
        tracing::info!(recovered, "re-enqueued attempts left unscored by a previous run");
    }

    let app = guild_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("guild API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
