//! # Activity Stream
//!
//! Append-only feed of marketplace events. Emission is fire-and-forget: a
//! sink failure is logged and dropped, and never changes the outcome of the
//! operation that emitted the event.
//!
//! Every event is also written as a `tracing` event under the
//! `guild::activity` target before it reaches the sink.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use guild_core::{AttemptId, PartyId, QuestId, Rank, Score};
use guild_oracle::VerdictSource;

use crate::store::StoreError;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityKind {
    QuestAccepted {
        quest_id: QuestId,
        party_id: PartyId,
        attempt_id: AttemptId,
    },
    QuestSubmitted {
        quest_id: QuestId,
        party_id: PartyId,
        attempt_id: AttemptId,
        time_taken_seconds: u64,
    },
    QuestScored {
        quest_id: QuestId,
        party_id: PartyId,
        attempt_id: AttemptId,
        score: Score,
        source: VerdictSource,
    },
    RankUp {
        party_id: PartyId,
        from: Rank,
        to: Rank,
    },
    QuestCompleted {
        quest_id: QuestId,
        winning_attempt_id: AttemptId,
        winning_party_id: PartyId,
        score: Score,
    },
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuestAccepted { .. } => "quest_accepted",
            Self::QuestSubmitted { .. } => "quest_submitted",
            Self::QuestScored { .. } => "quest_scored",
            Self::RankUp { .. } => "rank_up",
            Self::QuestCompleted { .. } => "quest_completed",
        }
    }
}

/// One activity entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn now(kind: ActivityKind) -> Self {
        Self { at: Utc::now(), kind }
    }
}

/// Durable or in-memory destination for activity events.
#[async_trait]
pub trait ActivityLog: Send + Sync + 'static {
    async fn append(&self, event: &ActivityEvent) -> Result<(), StoreError>;

    /// The most recent `limit` events, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEvent>, StoreError>;
}

/// Bounded in-memory activity log. The oldest events are evicted first.
#[derive(Debug, Clone)]
pub struct MemoryActivityLog {
    events: Arc<Mutex<VecDeque<ActivityEvent>>>,
    capacity: usize,
}

impl MemoryActivityLog {
    pub const DEFAULT_CAPACITY: usize = 1_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryActivityLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, event: &ActivityEvent) -> Result<(), StoreError> {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEvent>, StoreError> {
        Ok(self.events.lock().iter().rev().take(limit).cloned().collect())
    }
}

/// Emits activity events to the trace log and an [`ActivityLog`].
#[derive(Clone)]
pub struct Activity {
    log: Arc<dyn ActivityLog>,
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activity").finish_non_exhaustive()
    }
}

impl Activity {
    pub fn new(log: Arc<dyn ActivityLog>) -> Self {
        Self { log }
    }

    /// An emitter backed by a fresh [`MemoryActivityLog`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryActivityLog::default()))
    }

    pub fn log(&self) -> &Arc<dyn ActivityLog> {
        &self.log
    }

    /// Record an event. Never fails.
    pub async fn emit(&self, kind: ActivityKind) {
        let event = ActivityEvent::now(kind);
        let payload = serde_json::to_string(&event.kind).unwrap_or_default();
        tracing::info!(
            target: "guild::activity",
            kind = event.kind.as_str(),
            payload = %payload,
            "activity"
        );
        if let Err(e) = self.log.append(&event).await {
            tracing::warn!(kind = event.kind.as_str(), error = %e, "dropping activity event");
        }
    }

    /// The most recent events, newest first. Sink failures read as empty.
    pub async fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        match self.log.recent(limit).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read activity log");
                Vec::new()
            }
        }
    }
}
