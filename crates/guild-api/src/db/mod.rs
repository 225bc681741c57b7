//! # Database Persistence Layer
//!
//! Postgres persistence for the ledger via SQLx.
//!
//! The database is **optional**. When `DATABASE_URL` is set, parties,
//! quests, attempts and the activity feed are stored in PostgreSQL through
//! [`PgLedgerStore`] and [`PgActivityLog`]. When absent, the API runs on
//! the in-memory ledger and state does not survive restarts.

pub mod postgres;

pub use postgres::{PgActivityLog, PgLedgerStore};

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to `database_url` and run the embedded migrations.
///
/// Returns `None` when no URL is configured.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running on the in-memory ledger. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
