//! Structured payloads for planning notes.
//!
//! A "bedside note" is the agent's standing plan for a scope: what it is
//! focused on, what it is worried about, what it intends to do next. The
//! payload is a closed sum type — only `plan` notes carry bedside content,
//! and future note kinds get their own variant rather than an untyped bag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Typed payload carried alongside a note's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum StructuredContent {
    Bedside(BedsideNoteContent),
}

impl StructuredContent {
    /// The bedside payload, if that is what this is.
    pub fn as_bedside(&self) -> Option<&BedsideNoteContent> {
        match self {
            Self::Bedside(content) => Some(content),
        }
    }
}

/// Section-based planning content. Lists are insertion-ordered; the only
/// mutation primitives are set (focus), append, and remove (lists).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BedsideNoteContent {
    /// What the agent is currently working toward.
    #[serde(default)]
    pub current_focus: String,

    /// Standing risks and cautions, one line each.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Goals in flight.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_goals: Vec<Goal>,

    /// Concrete next actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,

    /// Unresolved questions about the manuscript.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub open_questions: Vec<String>,

    /// Recently learned facts worth keeping visible.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_discoveries: Vec<String>,

    /// Contradictions detected between revisions of this note.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictRecord>,
}

/// A goal the agent is tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub title: String,
    /// Completion fraction in [0, 1].
    pub progress: f32,
    pub status: GoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Blocked,
    Done,
    Abandoned,
}

/// One detected contradiction between a note's previous and current text.
///
/// Never an error: a conflict is attached to the evolved note and surfaced
/// as a warning, but it does not block the write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// The conflicting clause from the previous text.
    pub previous: String,
    /// The conflicting clause from the current text.
    pub current: String,
    /// Which detection strategy produced this record.
    pub strategy: ConflictStrategy,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    /// Who is expected to resolve it, if a policy was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    Heuristic,
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Auto,
    Agent,
    User,
}
