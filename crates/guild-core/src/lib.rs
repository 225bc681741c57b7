//! # guild-core: Foundational Types for guildhall
//!
//! Leaf crate of the workspace. Defines the domain primitives every other
//! crate shares: typed identifiers, quest difficulty, the rank ladder, the
//! reward schedule, and the validated 0–100 score.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `guild-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod difficulty;
pub mod error;
pub mod identity;
pub mod rank;
pub mod score;

pub use difficulty::{Difficulty, Reward};
pub use error::ValidationError;
pub use identity::{AttemptId, PartyId, QuestId};
pub use rank::{Rank, RANK_THRESHOLDS};
pub use score::{Score, COMPLETION_THRESHOLD, WIN_THRESHOLD};
