//! Memory notes — the atomic unit of agent knowledge.
//!
//! A note is created once and is logically immutable. "Updating" a note
//! either patches a standalone note that has no chain yet, or appends a
//! brand-new note that supersedes the prior one. Chain membership, version,
//! and supersession are explicit typed fields (`ChainLink`), not metadata
//! smuggled through the tag set; `topic_tags` carry only semantic labels
//! like `character:seth` or `seeded_from:author_bedside`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bedside::StructuredContent;

/// Who a note belongs to.
///
/// Project notes carry their project id in the variant — there is no way to
/// construct a project-scoped note without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum NoteScope {
    /// Scoped to a single manuscript project.
    Project { project_id: String },
    /// Scoped to the author — shared across all of their projects.
    Author,
}

impl NoteScope {
    /// The project id, if project-scoped.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Project { project_id } => Some(project_id),
            Self::Author => None,
        }
    }
}

/// What kind of knowledge a note records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Observation,
    Issue,
    Fact,
    Plan,
    Preference,
}

/// Chain membership for a note that is part of a supersession chain.
///
/// Within one chain, versions are strictly increasing integers starting at 1;
/// every version ≥ 2 records the id of the note it supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Identifier shared by every member of the chain.
    pub chain_id: String,
    /// This note's position in the chain, starting at 1.
    pub version: u32,
    /// Id of the note this one supersedes. `None` only for version 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    /// Caller-supplied reason for this revision (e.g. `roll_up`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_reason: Option<String>,
}

/// A single memory note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNote {
    /// Unique ID, immutable, assigned at creation.
    pub id: String,

    /// Ownership scope.
    pub scope: NoteScope,

    /// Kind of knowledge.
    pub kind: NoteKind,

    /// Plain-text body — the canonical human-readable content at this version.
    pub text: String,

    /// Free-form semantic labels (`character:seth`, `retrospective:project:p1`).
    /// Deduplicated on write; order is irrelevant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_tags: Vec<String>,

    /// Tie-break weight in [0, 1]. Never recomputed automatically.
    #[serde(default)]
    pub importance: f32,

    /// Optional typed payload carried alongside `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredContent>,

    /// Chain membership, if this note is part of a supersession chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainLink>,

    /// Id of the note that supersedes this one, once one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,

    /// Set when conflict detection flagged this revision against its
    /// predecessor. The records themselves live in the structured payload.
    #[serde(default)]
    pub conflict_detected: bool,

    /// When this note (this version) was created.
    pub created_at: DateTime<Utc>,
}

impl MemoryNote {
    /// Create a new standalone note with a fresh id.
    pub fn new(scope: NoteScope, kind: NoteKind, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            kind,
            text: text.into(),
            topic_tags: Vec::new(),
            importance: 0.5,
            structured: None,
            chain: None,
            superseded_by: None,
            conflict_detected: false,
            created_at: Utc::now(),
        }
    }

    /// Builder-style importance, clamped to [0, 1].
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Builder-style tags. Duplicates are dropped, insertion order kept.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.add_tag(tag.into());
        }
        self
    }

    /// Add a semantic tag if not already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.topic_tags.contains(&tag) {
            self.topic_tags.push(tag);
        }
    }

    /// True iff a successor note exists.
    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// This note's chain version, or `None` if it has no chain.
    pub fn chain_version(&self) -> Option<u32> {
        self.chain.as_ref().map(|c| c.version)
    }

    /// True iff this note is a bedside note: a `plan` note carrying
    /// structured bedside content.
    pub fn is_bedside(&self) -> bool {
        self.kind == NoteKind::Plan
            && matches!(self.structured, Some(StructuredContent::Bedside(_)))
    }
}

/// How a chain member came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Version 1 of a chain.
    Initial,
    /// Any later version.
    Supersede,
}

/// Read-side view of one chain member. Derived on read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedMemory {
    pub memory_id: String,
    pub text: String,
    pub version: u32,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChainedMemory {
    /// Derive the view from a stored chain member.
    ///
    /// Returns `None` for notes with no chain link.
    pub fn from_note(note: &MemoryNote) -> Option<Self> {
        let link = note.chain.as_ref()?;
        Some(Self {
            memory_id: note.id.clone(),
            text: note.text.clone(),
            version: link.version,
            change_type: if link.version == 1 {
                ChangeType::Initial
            } else {
                ChangeType::Supersede
            },
            change_reason: link.change_reason.clone(),
            timestamp: note.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_has_fresh_id_and_no_chain() {
        let note = MemoryNote::new(NoteScope::Author, NoteKind::Fact, "Prefers third person");
        assert!(!note.id.is_empty());
        assert!(note.chain.is_none());
        assert!(!note.is_superseded());
        assert_eq!(note.chain_version(), None);
    }

    #[test]
    fn importance_is_clamped() {
        let note = MemoryNote::new(NoteScope::Author, NoteKind::Fact, "x").with_importance(1.7);
        assert_eq!(note.importance, 1.0);
        let note = MemoryNote::new(NoteScope::Author, NoteKind::Fact, "x").with_importance(-0.2);
        assert_eq!(note.importance, 0.0);
    }

    #[test]
    fn tags_deduplicate_on_write() {
        let mut note = MemoryNote::new(
            NoteScope::Project {
                project_id: "p1".into(),
            },
            NoteKind::Observation,
            "Seth appears",
        );
        note.add_tag("character:seth");
        note.add_tag("character:seth");
        assert_eq!(note.topic_tags, vec!["character:seth".to_string()]);
    }

    #[test]
    fn chained_memory_derivation() {
        let mut note = MemoryNote::new(NoteScope::Author, NoteKind::Fact, "v2 text");
        assert!(ChainedMemory::from_note(&note).is_none());

        note.chain = Some(ChainLink {
            chain_id: "chain-1".into(),
            version: 2,
            supersedes: Some("prev-id".into()),
            change_reason: Some("correction".into()),
        });
        let view = ChainedMemory::from_note(&note).unwrap();
        assert_eq!(view.version, 2);
        assert_eq!(view.change_type, ChangeType::Supersede);
        assert_eq!(view.change_reason.as_deref(), Some("correction"));
    }

    #[test]
    fn version_one_is_initial() {
        let mut note = MemoryNote::new(NoteScope::Author, NoteKind::Plan, "start");
        note.chain = Some(ChainLink {
            chain_id: "c".into(),
            version: 1,
            supersedes: None,
            change_reason: None,
        });
        assert_eq!(
            ChainedMemory::from_note(&note).unwrap().change_type,
            ChangeType::Initial
        );
    }

    #[test]
    fn scope_serialization_roundtrip() {
        let note = MemoryNote::new(
            NoteScope::Project {
                project_id: "p42".into(),
            },
            NoteKind::Issue,
            "Pacing drags in chapter 3",
        );
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("p42"));
        let back: MemoryNote = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scope.project_id(), Some("p42"));
        assert_eq!(back.kind, NoteKind::Issue);
    }
}
