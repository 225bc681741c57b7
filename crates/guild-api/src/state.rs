//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! Owns the [`AttemptLedger`] and the sending half of the settlement queue.
//! Constructing the state also spawns the settlement worker, so it must
//! happen inside a Tokio runtime.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;

use guild_oracle::{OracleError, ResilientOracle};
use guild_settlement::{
    Activity, AttemptLedger, LedgerStore, MemoryLedgerStore, SettlementEngine, SettlementQueue,
    StoreError, DEFAULT_QUEUE_CAPACITY,
};

use crate::config::AppConfig;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ledger: AttemptLedger,
    pub queue: SettlementQueue,
    /// Present when the ledger is backed by Postgres.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Wire the ledger, settlement engine and worker over `store`.
    ///
    /// Returns the state and the worker's join handle.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn LedgerStore>,
        activity: Activity,
        db_pool: Option<PgPool>,
    ) -> Result<(Self, JoinHandle<()>), OracleError> {
        let oracle = ResilientOracle::from_config(&config.oracle)?;
        if !oracle.has_backend() {
            tracing::warn!("ORACLE_API_KEY not set, attempts will be scored by length heuristic");
        }

        let engine = Arc::new(SettlementEngine::new(store.clone(), oracle, activity.clone()));
        let (queue, worker) = SettlementQueue::start(
            engine,
            config.settlement_concurrency,
            DEFAULT_QUEUE_CAPACITY,
        );
        let ledger = AttemptLedger::new(store, activity, queue.clone());

        let state = Self {
            config: Arc::new(config),
            ledger,
            queue,
            db_pool,
        };
        Ok((state, worker))
    }

    /// State over a fresh in-memory ledger.
    pub fn in_memory(config: AppConfig) -> Result<(Self, JoinHandle<()>), OracleError> {
        Self::new(
            config,
            Arc::new(MemoryLedgerStore::new()),
            Activity::in_memory(),
            None,
        )
    }

    /// Re-enqueue attempts left submitted by a previous process.
    pub async fn recover(&self) -> Result<usize, StoreError> {
        self.queue.recover(self.ledger.store().as_ref()).await
    }
}
