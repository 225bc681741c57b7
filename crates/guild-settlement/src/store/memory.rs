//! In-memory [`LedgerStore`].
//!
//! All tables live behind one `parking_lot::RwLock`. Every compound write
//! validates all versions before mutating anything, under a single write
//! guard, so a failed write leaves no trace. The lock is never held across
//! an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use guild_core::{AttemptId, PartyId, QuestId};
use guild_state::{Attempt, AttemptStatus, Party, Quest, QuestStatus};

use super::{LedgerStore, RecordKind, StoreError};

#[derive(Debug, Default)]
struct Tables {
    parties: HashMap<PartyId, Party>,
    quests: HashMap<QuestId, Quest>,
    attempts: HashMap<AttemptId, Attempt>,
    by_pair: HashMap<(QuestId, PartyId), AttemptId>,
}

impl Tables {
    fn check_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        let stored = self
            .quests
            .get(&quest.id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Quest, quest.id))?;
        if stored.version != quest.version {
            return Err(StoreError::conflict(RecordKind::Quest, quest.id, quest.version));
        }
        Ok(())
    }

    fn check_party(&self, party: &Party) -> Result<(), StoreError> {
        let stored = self
            .parties
            .get(&party.id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Party, party.id))?;
        if stored.version != party.version {
            return Err(StoreError::conflict(RecordKind::Party, party.id, party.version));
        }
        Ok(())
    }

    fn check_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let stored = self
            .attempts
            .get(&attempt.id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Attempt, attempt.id))?;
        if stored.version != attempt.version {
            return Err(StoreError::conflict(
                RecordKind::Attempt,
                attempt.id,
                attempt.version,
            ));
        }
        Ok(())
    }

    fn put_quest(&mut self, quest: &Quest) {
        let mut next = quest.clone();
        next.version += 1;
        self.quests.insert(next.id, next);
    }

    fn put_party(&mut self, party: &Party) {
        let mut next = party.clone();
        next.version += 1;
        self.parties.insert(next.id, next);
    }

    fn put_attempt(&mut self, attempt: &Attempt) {
        let mut next = attempt.clone();
        next.version += 1;
        self.attempts.insert(next.id, next);
    }
}

/// Thread-safe, cloneable in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first(mut attempts: Vec<Attempt>) -> Vec<Attempt> {
    attempts.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
    attempts
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_party(&self, party: &Party) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if t.parties.contains_key(&party.id) {
            return Err(StoreError::Duplicate {
                kind: RecordKind::Party,
                detail: party.id.to_string(),
            });
        }
        t.parties.insert(party.id, party.clone());
        Ok(())
    }

    async fn get_party(&self, id: PartyId) -> Result<Option<Party>, StoreError> {
        Ok(self.tables.read().parties.get(&id).cloned())
    }

    async fn list_parties(&self) -> Result<Vec<Party>, StoreError> {
        Ok(self.tables.read().parties.values().cloned().collect())
    }

    async fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if t.quests.contains_key(&quest.id) {
            return Err(StoreError::Duplicate {
                kind: RecordKind::Quest,
                detail: quest.id.to_string(),
            });
        }
        t.quests.insert(quest.id, quest.clone());
        Ok(())
    }

    async fn get_quest(&self, id: QuestId) -> Result<Option<Quest>, StoreError> {
        Ok(self.tables.read().quests.get(&id).cloned())
    }

    async fn list_quests(&self, status: Option<QuestStatus>) -> Result<Vec<Quest>, StoreError> {
        let mut quests: Vec<Quest> = self
            .tables
            .read()
            .quests
            .values()
            .filter(|q| status.map_or(true, |s| q.status == s))
            .cloned()
            .collect();
        quests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(quests)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StoreError> {
        Ok(self.tables.read().attempts.get(&id).cloned())
    }

    async fn find_attempt(
        &self,
        quest: QuestId,
        party: PartyId,
    ) -> Result<Option<Attempt>, StoreError> {
        let t = self.tables.read();
        Ok(t
            .by_pair
            .get(&(quest, party))
            .and_then(|id| t.attempts.get(id))
            .cloned())
    }

    async fn attempts_for_quest(&self, quest: QuestId) -> Result<Vec<Attempt>, StoreError> {
        let attempts = self
            .tables
            .read()
            .attempts
            .values()
            .filter(|a| a.quest_id == quest)
            .cloned()
            .collect();
        Ok(oldest_first(attempts))
    }

    async fn attempts_with_status(
        &self,
        status: AttemptStatus,
    ) -> Result<Vec<Attempt>, StoreError> {
        let attempts = self
            .tables
            .read()
            .attempts
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        Ok(oldest_first(attempts))
    }

    async fn admit_attempt(&self, quest: &Quest, attempt: &Attempt) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        t.check_quest(quest)?;
        let pair = (attempt.quest_id, attempt.party_id);
        if t.by_pair.contains_key(&pair) {
            return Err(StoreError::Duplicate {
                kind: RecordKind::Attempt,
                detail: format!("quest {} party {}", pair.0, pair.1),
            });
        }
        t.put_quest(quest);
        t.by_pair.insert(pair, attempt.id);
        t.attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        t.check_attempt(attempt)?;
        t.put_attempt(attempt);
        Ok(())
    }

    async fn commit_score(&self, attempt: &Attempt, party: &Party) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        t.check_attempt(attempt)?;
        t.check_party(party)?;
        t.put_attempt(attempt);
        t.put_party(party);
        Ok(())
    }

    async fn close_quest(&self, quest: &Quest, attempts: &[Attempt]) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        t.check_quest(quest)?;
        for attempt in attempts {
            t.check_attempt(attempt)?;
        }
        t.put_quest(quest);
        for attempt in attempts {
            t.put_attempt(attempt);
        }
        Ok(())
    }
}
