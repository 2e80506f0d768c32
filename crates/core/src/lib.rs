//! # Scriptorium Core
//!
//! Domain types, traits, and error definitions for the Scriptorium agent
//! memory subsystem — the part of a manuscript-writing tool that lets an AI
//! co-author accumulate durable project knowledge across sessions.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping note-store backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod bedside;
pub mod error;
pub mod llm;
pub mod note;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use bedside::{
    BedsideNoteContent, ConflictRecord, ConflictResolution, ConflictStrategy, Goal, GoalStatus,
    StructuredContent,
};
pub use error::{ChainError, Error, GenerateError, Result, StoreError};
pub use llm::TextGenerator;
pub use note::{ChainLink, ChainedMemory, ChangeType, MemoryNote, NoteKind, NoteScope};
pub use store::{NoteQuery, NoteStore, ScopeFilter};
