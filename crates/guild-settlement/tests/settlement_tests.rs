//! End-to-end settlement behaviour over the in-memory store.
//!
//! Most tests drive [`SettlementEngine::settle`] directly so the order of
//! events is deterministic; the worker tests go through the queue.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use guild_core::{AttemptId, Difficulty, PartyId, QuestId, Rank, Score};
use guild_oracle::{
    OracleError, ResilientOracle, ScoringOracle, ScoringRequest, Verdict, VerdictSource,
};
use guild_settlement::{
    Activity, ActivityKind, AttemptLedger, LedgerStore, MemoryLedgerStore, RecordKind, SettlementEngine,
    SettlementError, SettlementQueue, StoreError,
};
use guild_state::{Attempt, AttemptStatus, NewQuest, Party, Quest, QuestStatus};
use tokio::sync::mpsc;

/// Scores a result by parsing it as an integer; anything else is an error.
struct NumericOracle;

#[async_trait]
impl ScoringOracle for NumericOracle {
    async fn score(&self, request: &ScoringRequest) -> Result<Verdict, OracleError> {
        let value: i64 = request
            .result_text
            .trim()
            .parse()
            .map_err(|_| OracleError::Malformed("not a number".into()))?;
        Ok(Verdict {
            score: Score::clamped(value),
            feedback: format!("judged {value}"),
            source: VerdictSource::Llm,
        })
    }
}

struct Harness {
    store: Arc<dyn LedgerStore>,
    ledger: AttemptLedger,
    engine: Arc<SettlementEngine>,
    activity: Activity,
    _rx: mpsc::Receiver<AttemptId>,
}

fn harness_with(store: Arc<dyn LedgerStore>, oracle: ResilientOracle) -> Harness {
    let activity = Activity::in_memory();
    let (queue, rx) = SettlementQueue::channel(256);
    let ledger = AttemptLedger::new(store.clone(), activity.clone(), queue);
    let engine = Arc::new(SettlementEngine::new(store.clone(), oracle, activity.clone()));
    Harness {
        store,
        ledger,
        engine,
        activity,
        _rx: rx,
    }
}

fn heuristic_harness() -> Harness {
    harness_with(
        Arc::new(MemoryLedgerStore::new()),
        ResilientOracle::heuristic_only(),
    )
}

fn numeric_harness() -> Harness {
    harness_with(
        Arc::new(MemoryLedgerStore::new()),
        ResilientOracle::new(Arc::new(NumericOracle), Duration::from_secs(1)),
    )
}

fn new_quest(difficulty: Difficulty, max_attempts: u32) -> NewQuest {
    NewQuest {
        title: "Clear the old mine".into(),
        description: "Report what lives in the lower galleries".into(),
        acceptance_criteria: Some("Names every creature found".into()),
        difficulty,
        category: "exploration".into(),
        gold_reward: 100,
        rp_reward: None,
        max_attempts,
    }
}

impl Harness {
    async fn submit(&self, quest: &Quest, party: &Party, text: &str) -> Attempt {
        self.ledger.accept(quest.id, party.id).await.unwrap();
        self.ledger
            .submit(quest.id, party.id, text.to_string(), None)
            .await
            .unwrap()
    }

    async fn quest(&self, id: QuestId) -> Quest {
        self.ledger.quest(id).await.unwrap()
    }

    async fn party(&self, id: PartyId) -> Party {
        self.ledger.party(id).await.unwrap()
    }

    async fn attempt(&self, id: AttemptId) -> Attempt {
        self.ledger.attempt(id).await.unwrap()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn longer_heuristic_result_wins_the_quest() {
    let h = heuristic_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 2)).await.unwrap();
    let a = h.ledger.register_party("A").await.unwrap();
    let b = h.ledger.register_party("B").await.unwrap();

    let attempt_a = h.submit(&quest, &a, "hello").await;
    let report_a = h.engine.settle(attempt_a.id).await.unwrap();
    assert_eq!(report_a.verdict.source, VerdictSource::Heuristic);
    assert!(report_a.verdict.feedback.contains("brief"));
    assert!(report_a.closure.is_none(), "B has not submitted yet");

    let attempt_b = h.submit(&quest, &b, &"x".repeat(3000)).await;
    let report_b = h.engine.settle(attempt_b.id).await.unwrap();
    assert!(report_b.verdict.feedback.contains("substantial"));
    assert!(report_b.verdict.score > report_a.verdict.score);

    let closure = report_b.closure.expect("last settlement closes the quest");
    assert_eq!(closure.winning_attempt_id, attempt_b.id);
    assert_eq!(closure.losing_attempt_ids, vec![attempt_a.id]);

    let quest = h.quest(quest.id).await;
    assert_eq!(quest.status, QuestStatus::Completed);
    assert_eq!(quest.winning_attempt_id, Some(attempt_b.id));
    assert_eq!(h.attempt(attempt_a.id).await.status, AttemptStatus::Lost);
    assert_eq!(h.attempt(attempt_b.id).await.status, AttemptStatus::Won);
}

#[tokio::test]
async fn crossing_one_hundred_rp_ranks_up_to_silver() {
    let h = numeric_harness();
    let mut veteran = Party::register("Veterans", Utc::now());
    veteran.rp = 95;
    h.store.insert_party(&veteran).await.unwrap();

    let quest = h.ledger.post_quest(new_quest(Difficulty::C, 1)).await.unwrap();
    let attempt = h.submit(&quest, &veteran, "90").await;
    let report = h.engine.settle(attempt.id).await.unwrap();

    assert_eq!(report.application.reward.rp, 10);
    assert_eq!(report.party.rp, 105);
    assert_eq!(report.party.rank, Rank::Silver);
    assert!(report.application.ranked_up());

    let stored = h.party(veteran.id).await;
    assert_eq!(stored.rp, 105);
    assert_eq!(stored.rank, Rank::Silver);

    let kinds: Vec<&str> = h
        .activity
        .recent(10)
        .await
        .iter()
        .map(|e| e.kind.as_str())
        .collect();
    assert!(kinds.contains(&"rank_up"));
    assert!(kinds.contains(&"quest_scored"));
    assert!(kinds.contains(&"quest_completed"));
}

// ── Aggregates ───────────────────────────────────────────────────────

#[tokio::test]
async fn aggregates_follow_completion_threshold_and_rewards() {
    let h = numeric_harness();
    let party = h.ledger.register_party("Solo").await.unwrap();

    for (score, difficulty) in [("49", Difficulty::S), ("50", Difficulty::A), ("70", Difficulty::B)] {
        let quest = h.ledger.post_quest(new_quest(difficulty, 1)).await.unwrap();
        let attempt = h.submit(&quest, &party, score).await;
        h.engine.settle(attempt.id).await.unwrap();
    }

    let party = h.party(party.id).await;
    assert_eq!(party.quests_failed, 1);
    assert_eq!(party.quests_completed, 2);
    assert_eq!(party.avg_score, 56); // (49 + 50 + 70) / 3 = 56.33
    // Only the 70 on a B quest earns anything.
    assert_eq!(party.rp, Difficulty::B.reward().rp);
    assert_eq!(party.gold_earned, Difficulty::B.reward().gold);
}

#[tokio::test]
async fn every_winner_eligible_attempt_is_paid() {
    let h = numeric_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::A, 2)).await.unwrap();
    let a = h.ledger.register_party("A").await.unwrap();
    let b = h.ledger.register_party("B").await.unwrap();

    let attempt_a = h.submit(&quest, &a, "85").await;
    let attempt_b = h.submit(&quest, &b, "90").await;
    h.engine.settle(attempt_a.id).await.unwrap();
    let report = h.engine.settle(attempt_b.id).await.unwrap();
    assert_eq!(report.closure.unwrap().winning_attempt_id, attempt_b.id);

    let reward = Difficulty::A.reward();
    assert_eq!(h.party(a.id).await.rp, reward.rp);
    assert_eq!(h.party(a.id).await.gold_earned, reward.gold);
    assert_eq!(h.party(b.id).await.rp, reward.rp);
}

#[tokio::test]
async fn unparseable_llm_reply_falls_back_to_heuristic() {
    let h = numeric_harness();
    let party = h.ledger.register_party("P").await.unwrap();
    let quest = h.ledger.post_quest(new_quest(Difficulty::C, 1)).await.unwrap();
    let attempt = h.submit(&quest, &party, "a short prose answer").await;
    let report = h.engine.settle(attempt.id).await.unwrap();
    assert_eq!(report.verdict.source, VerdictSource::Heuristic);
    assert_eq!(report.attempt.status, AttemptStatus::Scored);
}

// ── Winner selection ─────────────────────────────────────────────────

#[tokio::test]
async fn quest_stays_open_while_an_attempt_is_pending() {
    let h = numeric_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 3)).await.unwrap();
    let a = h.ledger.register_party("A").await.unwrap();
    let b = h.ledger.register_party("B").await.unwrap();

    let attempt_a = h.submit(&quest, &a, "99").await;
    h.ledger.accept(quest.id, b.id).await.unwrap();
    let report = h.engine.settle(attempt_a.id).await.unwrap();

    assert!(report.closure.is_none());
    assert_eq!(h.quest(quest.id).await.status, QuestStatus::InProgress);
    assert_eq!(h.attempt(attempt_a.id).await.status, AttemptStatus::Scored);
}

#[tokio::test]
async fn winner_selection_is_idempotent() {
    let h = numeric_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 2)).await.unwrap();
    let a = h.ledger.register_party("A").await.unwrap();
    let b = h.ledger.register_party("B").await.unwrap();
    let attempt_a = h.submit(&quest, &a, "60").await;
    let attempt_b = h.submit(&quest, &b, "80").await;
    h.engine.settle(attempt_a.id).await.unwrap();
    h.engine.settle(attempt_b.id).await.unwrap();

    let before = h.quest(quest.id).await;
    assert!(h.engine.select_winner(quest.id).await.unwrap().is_none());
    assert!(h.engine.select_winner(quest.id).await.unwrap().is_none());
    assert_eq!(h.quest(quest.id).await, before);

    let attempts = h.ledger.quest_attempts(quest.id).await.unwrap();
    let won = attempts.iter().filter(|a| a.status == AttemptStatus::Won).count();
    let lost = attempts.iter().filter(|a| a.status == AttemptStatus::Lost).count();
    assert_eq!((won, lost), (1, 1));
}

#[tokio::test]
async fn quest_with_no_attempts_is_not_closed() {
    let h = numeric_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 2)).await.unwrap();
    assert!(h.engine.select_winner(quest.id).await.unwrap().is_none());
    assert_eq!(h.quest(quest.id).await.status, QuestStatus::Open);
}

#[tokio::test]
async fn completed_quest_rejects_new_attempts() {
    let h = numeric_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 3)).await.unwrap();
    let a = h.ledger.register_party("A").await.unwrap();
    let late = h.ledger.register_party("Late").await.unwrap();
    let attempt = h.submit(&quest, &a, "75").await;
    h.engine.settle(attempt.id).await.unwrap();

    let err = h.ledger.accept(quest.id, late.id).await.unwrap_err();
    assert!(matches!(
        err,
        guild_settlement::LedgerError::QuestNotAcceptingAttempts {
            status: QuestStatus::Completed,
            ..
        }
    ));
}

// ── At-most-once scoring ─────────────────────────────────────────────

#[tokio::test]
async fn scored_attempt_is_never_rescored() {
    let h = numeric_harness();
    let party = h.ledger.register_party("P").await.unwrap();
    let quest = h.ledger.post_quest(new_quest(Difficulty::C, 2)).await.unwrap();
    let other = h.ledger.register_party("Q").await.unwrap();
    h.ledger.accept(quest.id, other.id).await.unwrap();
    let attempt = h.submit(&quest, &party, "80").await;

    h.engine.settle(attempt.id).await.unwrap();
    let after_first = h.party(party.id).await;
    let err = h.engine.settle(attempt.id).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::NotSubmitted {
            status: AttemptStatus::Scored,
            ..
        }
    ));
    assert_eq!(h.party(party.id).await, after_first);
}

#[tokio::test]
async fn concurrent_settlements_of_one_attempt_score_once() {
    let h = numeric_harness();
    let party = h.ledger.register_party("P").await.unwrap();
    let quest = h.ledger.post_quest(new_quest(Difficulty::C, 1)).await.unwrap();
    let attempt = h.submit(&quest, &party, "72").await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move { engine.settle(attempt.id).await }));
    }
    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    let party = h.party(party.id).await;
    assert_eq!(party.resolved_count(), 1);
    assert_eq!(party.rp, Difficulty::C.reward().rp);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_settlements_of_one_quest_declare_one_winner() {
    for _ in 0..10 {
        let h = numeric_harness();
        let quest = h.ledger.post_quest(new_quest(Difficulty::A, 6)).await.unwrap();
        let mut attempts = Vec::new();
        for i in 0..6 {
            let party = h.ledger.register_party(&format!("p{i}")).await.unwrap();
            attempts.push(h.submit(&quest, &party, &(60 + i).to_string()).await.id);
        }

        let mut tasks = Vec::new();
        for &id in &attempts {
            let engine = h.engine.clone();
            tasks.push(tokio::spawn(async move { engine.settle(id).await }));
        }
        let mut closures = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().closure.is_some() {
                closures += 1;
            }
        }
        assert_eq!(closures, 1);

        let stored = h.ledger.quest_attempts(quest.id).await.unwrap();
        let won: Vec<_> = stored.iter().filter(|a| a.status == AttemptStatus::Won).collect();
        let lost = stored.iter().filter(|a| a.status == AttemptStatus::Lost).count();
        assert_eq!(won.len(), 1);
        assert_eq!(lost, 5);
        assert_eq!(won[0].id, attempts[5]);

        let quest = h.quest(quest.id).await;
        assert_eq!(quest.status, QuestStatus::Completed);
        assert_eq!(quest.winning_attempt_id, Some(attempts[5]));

        let completed = h
            .activity
            .recent(100)
            .await
            .into_iter()
            .filter(|e| matches!(e.kind, ActivityKind::QuestCompleted { .. }))
            .count();
        assert_eq!(completed, 1);
    }
}

// ── Admission under contention ───────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_accepts_never_exceed_max_attempts() {
    let h = numeric_harness();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 3)).await.unwrap();
    let mut parties = Vec::new();
    for i in 0..12 {
        parties.push(h.ledger.register_party(&format!("p{i}")).await.unwrap());
    }

    let mut tasks = Vec::new();
    for party in parties {
        let ledger = h.ledger.clone();
        let quest_id = quest.id;
        tasks.push(tokio::spawn(async move { ledger.accept(quest_id, party.id).await }));
    }
    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 3);
    assert_eq!(h.ledger.quest_attempts(quest.id).await.unwrap().len(), 3);
}

// ── Aggregate conflicts ──────────────────────────────────────────────

/// Wraps a store and fails the first `failures` score commits with a party
/// conflict.
struct FlakyParty {
    inner: MemoryLedgerStore,
    failures: u32,
    seen: AtomicU32,
}

#[async_trait]
impl LedgerStore for FlakyParty {
    async fn insert_party(&self, party: &Party) -> Result<(), StoreError> {
        self.inner.insert_party(party).await
    }
    async fn get_party(&self, id: PartyId) -> Result<Option<Party>, StoreError> {
        self.inner.get_party(id).await
    }
    async fn list_parties(&self) -> Result<Vec<Party>, StoreError> {
        self.inner.list_parties().await
    }
    async fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        self.inner.insert_quest(quest).await
    }
    async fn get_quest(&self, id: QuestId) -> Result<Option<Quest>, StoreError> {
        self.inner.get_quest(id).await
    }
    async fn list_quests(&self, status: Option<QuestStatus>) -> Result<Vec<Quest>, StoreError> {
        self.inner.list_quests(status).await
    }
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StoreError> {
        self.inner.get_attempt(id).await
    }
    async fn find_attempt(
        &self,
        quest: QuestId,
        party: PartyId,
    ) -> Result<Option<Attempt>, StoreError> {
        self.inner.find_attempt(quest, party).await
    }
    async fn attempts_for_quest(&self, quest: QuestId) -> Result<Vec<Attempt>, StoreError> {
        self.inner.attempts_for_quest(quest).await
    }
    async fn attempts_with_status(
        &self,
        status: AttemptStatus,
    ) -> Result<Vec<Attempt>, StoreError> {
        self.inner.attempts_with_status(status).await
    }
    async fn admit_attempt(&self, quest: &Quest, attempt: &Attempt) -> Result<(), StoreError> {
        self.inner.admit_attempt(quest, attempt).await
    }
    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        self.inner.update_attempt(attempt).await
    }
    async fn commit_score(&self, attempt: &Attempt, party: &Party) -> Result<(), StoreError> {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StoreError::conflict(RecordKind::Party, party.id, party.version));
        }
        self.inner.commit_score(attempt, party).await
    }
    async fn close_quest(&self, quest: &Quest, attempts: &[Attempt]) -> Result<(), StoreError> {
        self.inner.close_quest(quest, attempts).await
    }
}

fn flaky_harness(failures: u32) -> Harness {
    harness_with(
        Arc::new(FlakyParty {
            inner: MemoryLedgerStore::new(),
            failures,
            seen: AtomicU32::new(0),
        }),
        ResilientOracle::new(Arc::new(NumericOracle), Duration::from_secs(1)),
    )
}

#[tokio::test]
async fn party_conflicts_are_retried_against_fresh_snapshot() {
    let h = flaky_harness(3);
    let party = h.ledger.register_party("P").await.unwrap();
    let quest = h.ledger.post_quest(new_quest(Difficulty::C, 1)).await.unwrap();
    let attempt = h.submit(&quest, &party, "88").await;

    let report = h.engine.settle(attempt.id).await.unwrap();
    assert_eq!(report.party.resolved_count(), 1);
    assert_eq!(h.party(party.id).await.avg_score, 88);
}

#[tokio::test]
async fn exhausted_retries_leave_attempt_submitted_and_aggregates_untouched() {
    let h = flaky_harness(u32::MAX);
    let party = h.ledger.register_party("P").await.unwrap();
    let quest = h.ledger.post_quest(new_quest(Difficulty::C, 1)).await.unwrap();
    let attempt = h.submit(&quest, &party, "88").await;

    let err = h.engine.settle(attempt.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::RetriesExhausted { .. }));
    assert_eq!(h.attempt(attempt.id).await.status, AttemptStatus::Submitted);
    let stored = h.party(party.id).await;
    assert_eq!(stored.resolved_count(), 0);
    assert_eq!(stored.rp, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_for_one_party_keep_exact_average() {
    let h = numeric_harness();
    let party = h.ledger.register_party("Busy").await.unwrap();
    let scores = [10, 55, 71, 100];
    let mut attempts = Vec::new();
    for s in scores {
        let quest = h.ledger.post_quest(new_quest(Difficulty::C, 1)).await.unwrap();
        attempts.push(h.submit(&quest, &party, &s.to_string()).await.id);
    }

    let mut tasks = Vec::new();
    for id in attempts {
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move { engine.settle(id).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let party = h.party(party.id).await;
    assert_eq!(party.resolved_count(), 4);
    assert_eq!(party.quests_failed, 1);
    assert_eq!(party.avg_score, 59); // 236 / 4
    assert_eq!(party.rp, 2 * Difficulty::C.reward().rp);
}

// ── Background worker ────────────────────────────────────────────────

async fn wait_for_status(h: &Harness, id: AttemptId, status: AttemptStatus) {
    for _ in 0..200 {
        if h.attempt(id).await.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("attempt {id} never reached {status}");
}

#[tokio::test]
async fn worker_settles_submissions_in_background() {
    let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
    let activity = Activity::in_memory();
    let engine = Arc::new(SettlementEngine::new(
        store.clone(),
        ResilientOracle::new(Arc::new(NumericOracle), Duration::from_secs(1)),
        activity.clone(),
    ));
    let (queue, _worker) = SettlementQueue::start(engine.clone(), 2, 16);
    let (_, rx) = SettlementQueue::channel(1);
    let h = Harness {
        store: store.clone(),
        ledger: AttemptLedger::new(store, activity.clone(), queue),
        engine,
        activity,
        _rx: rx,
    };

    let quest = h.ledger.post_quest(new_quest(Difficulty::S, 1)).await.unwrap();
    let party = h.ledger.register_party("P").await.unwrap();
    let attempt = h.submit(&quest, &party, "95").await;
    assert_eq!(attempt.status, AttemptStatus::Submitted);

    wait_for_status(&h, attempt.id, AttemptStatus::Won).await;
    assert_eq!(h.quest(quest.id).await.winning_attempt_id, Some(attempt.id));
    assert_eq!(h.party(party.id).await.rp, Difficulty::S.reward().rp);
}

/// Delays every verdict so the queue backs up.
struct SlowOracle(Duration);

#[async_trait]
impl ScoringOracle for SlowOracle {
    async fn score(&self, request: &ScoringRequest) -> Result<Verdict, OracleError> {
        tokio::time::sleep(self.0).await;
        NumericOracle.score(request).await
    }
}

#[tokio::test]
async fn saturated_queue_still_settles_every_submission() {
    let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
    let activity = Activity::in_memory();
    let engine = Arc::new(SettlementEngine::new(
        store.clone(),
        ResilientOracle::new(
            Arc::new(SlowOracle(Duration::from_millis(50))),
            Duration::from_secs(1),
        ),
        activity.clone(),
    ));
    // One job in flight and one slot in the channel.
    let (queue, _worker) = SettlementQueue::start(engine.clone(), 1, 1);
    let (_, rx) = SettlementQueue::channel(1);
    let h = Harness {
        store: store.clone(),
        ledger: AttemptLedger::new(store, activity.clone(), queue),
        engine,
        activity,
        _rx: rx,
    };

    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 4)).await.unwrap();
    let mut parties = Vec::new();
    for i in 0..4 {
        let party = h.ledger.register_party(&format!("p{i}")).await.unwrap();
        h.ledger.accept(quest.id, party.id).await.unwrap();
        parties.push(party);
    }
    for (i, party) in parties.iter().enumerate() {
        h.ledger
            .submit(quest.id, party.id, (70 + i).to_string(), None)
            .await
            .unwrap();
    }

    for _ in 0..500 {
        if h.quest(quest.id).await.status == QuestStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let attempts = h.ledger.quest_attempts(quest.id).await.unwrap();
    let statuses: Vec<_> = attempts.iter().map(|a| a.status).collect();
    assert!(
        attempts.iter().all(|a| a.score.is_some()),
        "unscored attempts left behind: {statuses:?}"
    );
    assert_eq!(h.quest(quest.id).await.status, QuestStatus::Completed);
    assert_eq!(
        attempts.iter().filter(|a| a.status == AttemptStatus::Won).count(),
        1
    );
}

#[tokio::test]
async fn recover_requeues_unscored_attempts() {
    // Submissions land while no worker is running.
    let h = numeric_harness();
    let party = h.ledger.register_party("P").await.unwrap();
    let quest = h.ledger.post_quest(new_quest(Difficulty::B, 1)).await.unwrap();
    let attempt = h.submit(&quest, &party, "77").await;

    // Restart: fresh worker over the same store.
    let (queue, _worker) = SettlementQueue::start(h.engine.clone(), 2, 16);
    let queued = queue.recover(h.store.as_ref()).await.unwrap();
    assert_eq!(queued, 1);
    wait_for_status(&h, attempt.id, AttemptStatus::Won).await;
}
