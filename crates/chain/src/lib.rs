//! Supersession chains and bedside notes — the write path of the Scriptorium
//! memory subsystem.
//!
//! The [`ChainEngine`] appends versioned revisions to notes without ever
//! mutating prior truth; the [`ConflictDetector`] flags contradictions
//! between revisions; the [`BedsideNoteEngine`] maintains the agent's
//! standing plan per scope and rolls chapter-level churn up through arc and
//! project scopes via a background [`rollup`] queue.

pub mod bedside;
pub mod conflict;
pub mod engine;
pub mod rollup;

pub use bedside::{
    BedsideNoteEngine, BedsideSection, EvolveBedsideOptions, MutationAction, SectionMutation,
};
pub use conflict::ConflictDetector;
pub use engine::{ChainEngine, ChainEvolution, ChainSummary, EvolveOptions};
pub use rollup::{RollupJob, RollupQueue};
