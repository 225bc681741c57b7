//! # guild-state: Lifecycle State Machines
//!
//! Pure, storage-agnostic lifecycle logic for the three settlement records.
//!
//! ## State Machines
//!
//! - **Quest** (`quest.rs`): `Open → InProgress → Completed`, with `Review`
//!   and `Expired` branches. Completed and expired quests are terminal.
//!
//! - **Attempt** (`attempt.rs`): `InProgress → Submitted → Scored → Won | Lost`.
//!
//! - **Party** (`party.rs`): not a state machine but an aggregate. Scoring
//!   events fold into RP, gold, completion counters, the running average and
//!   the derived rank.
//!
//! ## Design
//!
//! Every record carries a `version` used by stores for optimistic
//! concurrency. Methods here never touch the version; stores bump it on each
//! successful conditional write.

pub mod attempt;
pub mod party;
pub mod quest;

pub use attempt::{elapsed_seconds, Attempt, AttemptError, AttemptStatus};
pub use party::{rounded_mean, Party, ScoreApplication};
pub use quest::{NewQuest, Quest, QuestError, QuestStatus};
