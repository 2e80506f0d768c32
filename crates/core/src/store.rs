//! NoteStore trait — the persistence collaborator.
//!
//! A single flat collection of `MemoryNote` keyed by id, queryable by scope,
//! project, kind, tag membership, and chain id. The chain-id filter is the
//! one secondary index chain traversal genuinely needs; everything else is a
//! tag-filtered scan, which is acceptable because chains are short
//! author-facing histories, not high-volume logs.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::note::{MemoryNote, NoteKind};

/// Scope filter for queries. Distinct from `NoteScope` so callers can ask
/// for "any project note" without naming a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Notes belonging to the given project.
    Project(String),
    /// Author-scoped notes.
    Author,
}

/// A filter over the note collection. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct NoteQuery {
    pub scope: Option<ScopeFilter>,
    pub kind: Option<NoteKind>,
    /// Exact tag membership.
    pub tag: Option<String>,
    /// Members of one supersession chain.
    pub chain_id: Option<String>,
    /// Only bedside notes (plan notes carrying bedside content).
    pub bedside_only: bool,
    /// Maximum results; 0 means unlimited.
    pub limit: usize,
}

impl NoteQuery {
    /// All notes for one project.
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            scope: Some(ScopeFilter::Project(project_id.into())),
            ..Default::default()
        }
    }

    /// All author-scoped notes.
    pub fn author() -> Self {
        Self {
            scope: Some(ScopeFilter::Author),
            ..Default::default()
        }
    }

    /// All members of one chain.
    pub fn chain(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: Some(chain_id.into()),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: NoteKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn bedside(mut self) -> Self {
        self.bedside_only = true;
        self
    }

    /// Whether a note matches this filter.
    pub fn matches(&self, note: &MemoryNote) -> bool {
        if let Some(scope) = &self.scope {
            let ok = match scope {
                ScopeFilter::Project(pid) => note.scope.project_id() == Some(pid.as_str()),
                ScopeFilter::Author => note.scope.project_id().is_none(),
            };
            if !ok {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if note.kind != kind {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !note.topic_tags.contains(tag) {
                return false;
            }
        }
        if let Some(chain_id) = &self.chain_id {
            if note.chain.as_ref().map(|c| c.chain_id.as_str()) != Some(chain_id.as_str()) {
                return false;
            }
        }
        if self.bedside_only && !note.is_bedside() {
            return false;
        }
        true
    }
}

/// The persistence collaborator.
///
/// Implementations: in-memory (testing), JSONL file, SQLite.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// The backend name (e.g. "in_memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Fetch a note by id.
    async fn get(&self, id: &str) -> std::result::Result<Option<MemoryNote>, StoreError>;

    /// Fetch all notes matching a filter.
    async fn query(&self, query: NoteQuery) -> std::result::Result<Vec<MemoryNote>, StoreError>;

    /// Insert or replace a note. Returns the note's id.
    async fn put(&self, note: MemoryNote) -> std::result::Result<String, StoreError>;

    /// Insert or replace several notes.
    async fn bulk_put(&self, notes: Vec<MemoryNote>) -> std::result::Result<(), StoreError>;

    /// Delete a note by id. Chain continuity is not repaired.
    async fn delete(&self, id: &str) -> std::result::Result<bool, StoreError>;

    /// Total note count.
    async fn count(&self) -> std::result::Result<usize, StoreError>;

    /// Remove all notes.
    async fn clear(&self) -> std::result::Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{ChainLink, NoteScope};

    fn project_note(pid: &str, text: &str) -> MemoryNote {
        MemoryNote::new(
            NoteScope::Project {
                project_id: pid.into(),
            },
            NoteKind::Fact,
            text,
        )
    }

    #[test]
    fn empty_query_matches_everything() {
        let note = project_note("p1", "anything");
        assert!(NoteQuery::default().matches(&note));
    }

    #[test]
    fn scope_filter_separates_author_and_project() {
        let project = project_note("p1", "a");
        let author = MemoryNote::new(NoteScope::Author, NoteKind::Preference, "b");

        assert!(NoteQuery::project("p1").matches(&project));
        assert!(!NoteQuery::project("p1").matches(&author));
        assert!(!NoteQuery::project("p2").matches(&project));
        assert!(NoteQuery::author().matches(&author));
        assert!(!NoteQuery::author().matches(&project));
    }

    #[test]
    fn kind_and_tag_filters() {
        let mut note = project_note("p1", "Seth's sword is cursed");
        note.add_tag("character:seth");

        assert!(NoteQuery::project("p1").with_kind(NoteKind::Fact).matches(&note));
        assert!(!NoteQuery::project("p1").with_kind(NoteKind::Plan).matches(&note));
        assert!(NoteQuery::project("p1").with_tag("character:seth").matches(&note));
        assert!(!NoteQuery::project("p1").with_tag("character:mira").matches(&note));
    }

    #[test]
    fn chain_filter_requires_membership() {
        let mut note = project_note("p1", "v1");
        assert!(!NoteQuery::chain("c1").matches(&note));

        note.chain = Some(ChainLink {
            chain_id: "c1".into(),
            version: 1,
            supersedes: None,
            change_reason: None,
        });
        assert!(NoteQuery::chain("c1").matches(&note));
        assert!(!NoteQuery::chain("c2").matches(&note));
    }
}
