//! # Background Settlement Queue
//!
//! Submission hands the attempt id to [`SettlementQueue::enqueue`] and
//! returns. A single worker drains the channel and spawns one task per job,
//! with at most `concurrency` settlements in flight.
//!
//! ```text
//! submit ──▶ enqueue(id) ──▶ mpsc ──▶ worker ──▶ spawn(settle(id))
//!                                        │            ▲
//!                                        └─ Semaphore ┘
//! ```
//!
//! Enqueue never blocks. When the channel is full the send is handed to a
//! spawned task that waits for capacity, so every accepted job reaches the
//! worker. Only a closed queue (worker gone) leaves the attempt `submitted`;
//! [`SettlementQueue::recover`] re-enqueues such attempts at startup, and the
//! rescore endpoint does so on demand.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use guild_core::AttemptId;
use guild_state::AttemptStatus;

use crate::engine::SettlementEngine;
use crate::error::SettlementError;
use crate::store::{LedgerStore, StoreError};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

/// Sending half of the settlement queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SettlementQueue {
    tx: mpsc::Sender<AttemptId>,
}

impl SettlementQueue {
    /// A queue and its receiving end, with no worker attached.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AttemptId>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// A queue drained by a worker running `engine` with `concurrency`
    /// parallel jobs.
    pub fn start(
        engine: Arc<SettlementEngine>,
        concurrency: usize,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let worker = tokio::spawn(run_worker(rx, engine, concurrency));
        (queue, worker)
    }

    /// Schedule settlement of an attempt. Returns `false` if the job can
    /// never be delivered.
    pub fn enqueue(&self, attempt_id: AttemptId) -> bool {
        match self.tx.try_send(attempt_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => self.enqueue_when_free(attempt_id),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(
                    attempt_id = %attempt_id,
                    "settlement queue closed, attempt left submitted"
                );
                false
            }
        }
    }

    fn enqueue_when_free(&self, attempt_id: AttemptId) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                attempt_id = %attempt_id,
                "settlement queue full outside a runtime, attempt left submitted"
            );
            return false;
        };
        tracing::debug!(attempt_id = %attempt_id, "settlement queue full, waiting for capacity");
        let tx = self.tx.clone();
        runtime.spawn(async move {
            if tx.send(attempt_id).await.is_err() {
                tracing::error!(
                    attempt_id = %attempt_id,
                    "settlement queue closed, attempt left submitted"
                );
            }
        });
        true
    }

    /// Re-enqueue every attempt still waiting for a score. Returns how many
    /// were queued.
    pub async fn recover(&self, store: &dyn LedgerStore) -> Result<usize, StoreError> {
        let pending = store.attempts_with_status(AttemptStatus::Submitted).await?;
        let queued = pending.iter().filter(|a| self.enqueue(a.id)).count();
        if queued > 0 {
            tracing::info!(queued, found = pending.len(), "re-enqueued unscored attempts");
        }
        Ok(queued)
    }
}

/// Drain `rx`, settling each attempt on its own task.
///
/// Returns once every sender is dropped and every spawned job has finished.
pub async fn run_worker(
    mut rx: mpsc::Receiver<AttemptId>,
    engine: Arc<SettlementEngine>,
    concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut jobs = tokio::task::JoinSet::new();

    while let Some(attempt_id) = rx.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let engine = engine.clone();
        jobs.spawn(async move {
            let _permit = permit;
            settle_and_log(&engine, attempt_id).await;
        });
        while jobs.try_join_next().is_some() {}
    }

    while jobs.join_next().await.is_some() {}
    tracing::debug!("settlement worker stopped");
}

async fn settle_and_log(engine: &SettlementEngine, attempt_id: AttemptId) {
    match engine.settle(attempt_id).await {
        Ok(report) => {
            tracing::info!(
                attempt_id = %attempt_id,
                quest_id = %report.attempt.quest_id,
                party_id = %report.attempt.party_id,
                score = report.verdict.score.value(),
                source = %report.verdict.source,
                ranked_up = report.application.ranked_up(),
                quest_closed = report.closure.is_some(),
                "attempt settled"
            );
        }
        Err(SettlementError::NotSubmitted { status, .. }) => {
            tracing::debug!(attempt_id = %attempt_id, status = %status, "attempt already settled");
        }
        Err(e) => {
            tracing::error!(attempt_id = %attempt_id, error = %e, "settlement failed");
        }
    }
}
