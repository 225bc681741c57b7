//! # guild-settlement: Attempt Ledger and Settlement Pipeline
//!
//! ```text
//! accept ──▶ AttemptLedger ──▶ LedgerStore
//! submit ──▶ AttemptLedger ──▶ SettlementQueue ──▶ SettlementEngine
//!                                                    │
//!                         ResilientOracle ◀──────────┤
//!                         LedgerStore ◀──────────────┤ commit_score / close_quest
//!                         Activity ◀─────────────────┘
//! ```
//!
//! - [`store`]: persistence seam with optimistic concurrency, plus the
//!   in-memory implementation.
//! - [`ledger`]: party registration, quest posting, accept and submit.
//! - [`engine`]: scoring, party aggregates, winner selection.
//! - [`queue`]: background worker and crash recovery.
//! - [`activity`]: the activity feed.

pub mod activity;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod store;

pub use activity::{Activity, ActivityEvent, ActivityKind, ActivityLog, MemoryActivityLog};
pub use engine::{pick_winner, QuestClosure, SettlementEngine, SettlementReport, MAX_CONFLICT_RETRIES};
pub use error::{LedgerError, SettlementError};
pub use ledger::{AttemptLedger, MAX_ATTEMPTS_LIMIT};
pub use queue::{run_worker, SettlementQueue, DEFAULT_QUEUE_CAPACITY};
pub use store::{LedgerStore, MemoryLedgerStore, RecordKind, StoreError};
