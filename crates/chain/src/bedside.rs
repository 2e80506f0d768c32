//! Bedside notes — the agent's standing plan per scope.
//!
//! Exactly one live (non-superseded) bedside note exists per
//! (scope, project, qualifier) triple, where the qualifier narrows a project
//! note to a chapter or arc. Creation is read-before-write and therefore
//! idempotent. Every mutation routes through chain evolution, so the plan's
//! history is never edited in place.

use std::sync::Arc;

use scriptorium_core::bedside::{
    BedsideNoteContent, ConflictResolution, StructuredContent,
};
use scriptorium_core::error::ChainError;
use scriptorium_core::note::{MemoryNote, NoteKind, NoteScope};
use scriptorium_core::store::{NoteQuery, NoteStore};
use tracing::{debug, info};

use crate::conflict::ConflictDetector;
use crate::engine::{ChainEngine, EvolveOptions};
use crate::rollup::{RollupJob, RollupQueue};

const PROJECT_SEED_TEXT: &str = "Standing plan for this project. Capture focus, risks, and next \
                                 steps here as the manuscript evolves.";
const AUTHOR_SEED_TEXT: &str = "Author-level standing plan. Cross-project preferences, habits, \
                                and lessons live here.";
const BEDSIDE_IMPORTANCE: f32 = 0.9;

/// Qualifier tag prefixes that narrow a project bedside note.
const QUALIFIER_PREFIXES: &[&str] = &["chapter:", "arc:"];

/// Sections of a bedside note addressable by mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedsideSection {
    CurrentFocus,
    Warnings,
    NextSteps,
    OpenQuestions,
    RecentDiscoveries,
}

impl BedsideSection {
    fn as_str(self) -> &'static str {
        match self {
            Self::CurrentFocus => "current_focus",
            Self::Warnings => "warnings",
            Self::NextSteps => "next_steps",
            Self::OpenQuestions => "open_questions",
            Self::RecentDiscoveries => "recent_discoveries",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    /// Replace `current_focus`.
    Set,
    /// Append to a list section.
    Append,
    /// Remove from a list section by value equality.
    Remove,
}

/// A typed section mutation, versioned through chain evolution.
#[derive(Debug, Clone)]
pub struct SectionMutation {
    pub section: BedsideSection,
    pub action: MutationAction,
    pub content: String,
}

/// Options for [`BedsideNoteEngine::evolve_bedside_note`].
#[derive(Debug, Clone, Default)]
pub struct EvolveBedsideOptions {
    pub change_reason: Option<String>,
    /// Overrides the carried-forward structured content.
    pub structured: Option<BedsideNoteContent>,
    /// Stamped on every conflict record attached by this evolution.
    pub conflict_resolution: Option<ConflictResolution>,
    /// Targets the chapter-qualified bedside note and triggers roll-up.
    pub chapter_id: Option<String>,
    pub arc_id: Option<String>,
}

/// The bedside note's structured content, or an empty default for notes that
/// somehow lack one.
pub(crate) fn bedside_content_of(note: &MemoryNote) -> BedsideNoteContent {
    match &note.structured {
        Some(StructuredContent::Bedside(content)) => content.clone(),
        None => BedsideNoteContent::default(),
    }
}

/// Fetch the live bedside note for (scope, qualifier), creating it if absent.
///
/// A `None` qualifier means the plain project/author note; qualified notes
/// carry a `chapter:<id>` or `arc:<id>` tag.
pub(crate) async fn get_or_create_scoped(
    store: &Arc<dyn NoteStore>,
    scope: NoteScope,
    qualifier: Option<&str>,
) -> Result<MemoryNote, ChainError> {
    let mut query = match &scope {
        NoteScope::Project { project_id } => NoteQuery::project(project_id.clone()),
        NoteScope::Author => NoteQuery::author(),
    }
    .with_kind(NoteKind::Plan)
    .bedside();
    if let Some(tag) = qualifier {
        query = query.with_tag(tag);
    }

    let candidates = store.query(query).await?;
    let live = candidates
        .into_iter()
        .filter(|n| !n.is_superseded())
        .filter(|n| {
            // An unqualified lookup must not grab a chapter/arc note.
            qualifier.is_some()
                || !n
                    .topic_tags
                    .iter()
                    .any(|t| QUALIFIER_PREFIXES.iter().any(|p| t.starts_with(p)))
        })
        .max_by_key(|n| (n.chain_version().unwrap_or(0), n.created_at));

    if let Some(note) = live {
        return Ok(note);
    }

    let seed_text = match &scope {
        NoteScope::Project { .. } => PROJECT_SEED_TEXT,
        NoteScope::Author => AUTHOR_SEED_TEXT,
    };
    let mut note = MemoryNote::new(scope, NoteKind::Plan, seed_text)
        .with_importance(BEDSIDE_IMPORTANCE);
    note.structured = Some(StructuredContent::Bedside(BedsideNoteContent::default()));
    if let Some(tag) = qualifier {
        note.add_tag(tag);
    }
    store.put(note.clone()).await?;
    info!(note_id = %note.id, "Created bedside note");
    Ok(note)
}

/// Maintains bedside notes across scopes and versions them through the
/// chain engine, consulting the conflict detector on every text evolution.
pub struct BedsideNoteEngine {
    store: Arc<dyn NoteStore>,
    chain: ChainEngine,
    detector: ConflictDetector,
    rollups: RollupQueue,
}

impl BedsideNoteEngine {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self::with_detector(store, ConflictDetector::new())
    }

    pub fn with_detector(store: Arc<dyn NoteStore>, detector: ConflictDetector) -> Self {
        Self {
            chain: ChainEngine::new(store.clone()),
            rollups: RollupQueue::start(store.clone()),
            store,
            detector,
        }
    }

    fn require_project(project_id: &str, operation: &str) -> Result<(), ChainError> {
        if project_id.trim().is_empty() {
            return Err(ChainError::MissingScope {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// The project's live bedside note, created on first access.
    pub async fn get_or_create_bedside_note(
        &self,
        project_id: &str,
    ) -> Result<MemoryNote, ChainError> {
        Self::require_project(project_id, "get_or_create_bedside_note")?;
        get_or_create_scoped(
            &self.store,
            NoteScope::Project {
                project_id: project_id.to_string(),
            },
            None,
        )
        .await
    }

    /// The author-scoped bedside note, created on first access.
    pub async fn get_or_create_author_bedside_note(&self) -> Result<MemoryNote, ChainError> {
        get_or_create_scoped(&self.store, NoteScope::Author, None).await
    }

    /// Evolve the bedside note to `new_text`, attaching any detected
    /// conflicts, then (if a chapter is named) enqueue roll-up into arc and
    /// project scopes.
    pub async fn evolve_bedside_note(
        &self,
        project_id: &str,
        new_text: &str,
        options: EvolveBedsideOptions,
    ) -> Result<MemoryNote, ChainError> {
        Self::require_project(project_id, "evolve_bedside_note")?;

        let scope = NoteScope::Project {
            project_id: project_id.to_string(),
        };
        let qualifier = options.chapter_id.as_ref().map(|c| format!("chapter:{c}"));
        let current = get_or_create_scoped(&self.store, scope, qualifier.as_deref()).await?;

        let conflicts = self.detector.detect_conflicts(&current.text, new_text).await;

        let mut content = options
            .structured
            .unwrap_or_else(|| bedside_content_of(&current));
        if !conflicts.is_empty() {
            debug!(count = conflicts.len(), "Attaching detected conflicts");
            for (i, conflict) in conflicts.iter().enumerate() {
                content.warnings.insert(
                    i,
                    format!("Conflict: {} vs {}", conflict.previous, conflict.current),
                );
            }
            content.conflicts.extend(conflicts.iter().cloned().map(|mut c| {
                c.resolution = options.conflict_resolution;
                c
            }));
        }

        let evolved = self
            .chain
            .evolve_memory(
                &current.id,
                new_text,
                EvolveOptions {
                    change_reason: options.change_reason,
                    structured: Some(StructuredContent::Bedside(content)),
                    conflict_detected: !conflicts.is_empty(),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(chapter_id) = options.chapter_id {
            self.rollups.enqueue(RollupJob {
                project_id: project_id.to_string(),
                chapter_id,
                arc_id: options.arc_id,
                summary: first_sentence(new_text),
            });
        }

        Ok(evolved)
    }

    /// One-directional seed: append the author bedside note's standing
    /// warnings and discoveries into the project note. Project-specific
    /// content is never overwritten.
    pub async fn seed_project_bedside_note_from_author(
        &self,
        project_id: &str,
    ) -> Result<MemoryNote, ChainError> {
        Self::require_project(project_id, "seed_project_bedside_note_from_author")?;

        let author = self.get_or_create_author_bedside_note().await?;
        let project = self.get_or_create_bedside_note(project_id).await?;

        let author_content = bedside_content_of(&author);
        let mut content = bedside_content_of(&project);
        for warning in &author_content.warnings {
            if !content.warnings.contains(warning) {
                content.warnings.push(warning.clone());
            }
        }
        for discovery in &author_content.recent_discoveries {
            if !content.recent_discoveries.contains(discovery) {
                content.recent_discoveries.push(discovery.clone());
            }
        }

        self.chain
            .evolve_memory(
                &project.id,
                &project.text,
                EvolveOptions {
                    change_reason: Some("seed_from_author".into()),
                    structured: Some(StructuredContent::Bedside(content)),
                    extra_tags: vec!["seeded_from:author_bedside".into()],
                    ..Default::default()
                },
            )
            .await
    }

    /// At project completion, fold a summary into the author bedside note
    /// for cross-project learning.
    pub async fn record_project_retrospective(
        &self,
        project_id: &str,
        summary: &str,
    ) -> Result<MemoryNote, ChainError> {
        Self::require_project(project_id, "record_project_retrospective")?;

        let author = self.get_or_create_author_bedside_note().await?;
        let mut content = bedside_content_of(&author);
        content
            .recent_discoveries
            .push(format!("Project {project_id}: {summary}"));

        let new_text = format!(
            "{}\n\nProject retrospective ({project_id}): {summary}",
            author.text
        );
        self.chain
            .evolve_memory(
                &author.id,
                &new_text,
                EvolveOptions {
                    change_reason: Some("project_retrospective".into()),
                    structured: Some(StructuredContent::Bedside(content)),
                    extra_tags: vec![format!("retrospective:project:{project_id}")],
                    ..Default::default()
                },
            )
            .await
    }

    /// Apply a typed section mutation, versioned through evolution — never
    /// an in-place edit to a shared object.
    pub async fn apply_mutation(
        &self,
        project_id: &str,
        mutation: SectionMutation,
    ) -> Result<MemoryNote, ChainError> {
        Self::require_project(project_id, "apply_mutation")?;

        let current = self.get_or_create_bedside_note(project_id).await?;
        let mut content = bedside_content_of(&current);

        match (mutation.section, mutation.action) {
            (BedsideSection::CurrentFocus, MutationAction::Set) => {
                content.current_focus = mutation.content;
            }
            (BedsideSection::CurrentFocus, action) => {
                return Err(ChainError::InvalidMutation(format!(
                    "{action:?} is not valid on current_focus; only Set is"
                )));
            }
            (section, MutationAction::Set) => {
                return Err(ChainError::InvalidMutation(format!(
                    "Set is not valid on list section {}",
                    section.as_str()
                )));
            }
            (section, MutationAction::Append) => {
                list_section_mut(&mut content, section).push(mutation.content);
            }
            (section, MutationAction::Remove) => {
                list_section_mut(&mut content, section).retain(|item| item != &mutation.content);
            }
        }

        let section_name = mutation.section.as_str();
        self.evolve_bedside_note(
            project_id,
            &current.text,
            EvolveBedsideOptions {
                change_reason: Some(format!("mutation:{section_name}")),
                structured: Some(content),
                ..Default::default()
            },
        )
        .await
    }

    /// Wait for any in-flight roll-ups. Useful in tests and at shutdown.
    pub async fn drain_rollups(&self) {
        self.rollups.idle().await;
    }
}

fn list_section_mut(
    content: &mut BedsideNoteContent,
    section: BedsideSection,
) -> &mut Vec<String> {
    match section {
        BedsideSection::Warnings => &mut content.warnings,
        BedsideSection::NextSteps => &mut content.next_steps,
        BedsideSection::OpenQuestions => &mut content.open_questions,
        BedsideSection::RecentDiscoveries => &mut content.recent_discoveries,
        BedsideSection::CurrentFocus => unreachable!("handled by caller"),
    }
}

fn first_sentence(text: &str) -> String {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_store::InMemoryStore;

    fn engine() -> BedsideNoteEngine {
        BedsideNoteEngine::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let engine = engine();
        let first = engine.get_or_create_bedside_note("p1").await.unwrap();
        let second = engine.get_or_create_bedside_note("p1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_bedside());
    }

    #[tokio::test]
    async fn author_and_project_notes_are_distinct() {
        let engine = engine();
        let project = engine.get_or_create_bedside_note("p1").await.unwrap();
        let author = engine.get_or_create_author_bedside_note().await.unwrap();
        assert_ne!(project.id, author.id);
        assert_eq!(author.scope, NoteScope::Author);
    }

    #[tokio::test]
    async fn missing_project_id_fails_fast() {
        let engine = engine();
        let err = engine.get_or_create_bedside_note("").await.unwrap_err();
        assert!(matches!(err, ChainError::MissingScope { .. }));

        let err = engine
            .evolve_bedside_note("  ", "text", EvolveBedsideOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::MissingScope { .. }));
    }

    #[tokio::test]
    async fn evolution_attaches_conflicts_and_warnings() {
        let engine = engine();
        engine
            .evolve_bedside_note("p1", "Seth is alive.", EvolveBedsideOptions::default())
            .await
            .unwrap();

        let evolved = engine
            .evolve_bedside_note(
                "p1",
                "Seth is not alive.",
                EvolveBedsideOptions {
                    conflict_resolution: Some(ConflictResolution::Agent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(evolved.conflict_detected);
        let content = bedside_content_of(&evolved);
        assert_eq!(content.conflicts.len(), 1);
        assert_eq!(
            content.conflicts[0].resolution,
            Some(ConflictResolution::Agent)
        );
        assert!(content.warnings[0].starts_with("Conflict:"));
    }

    #[tokio::test]
    async fn evolution_without_conflicts_is_clean() {
        let engine = engine();
        engine
            .evolve_bedside_note("p1", "Draft the opening.", EvolveBedsideOptions::default())
            .await
            .unwrap();
        let evolved = engine
            .evolve_bedside_note(
                "p1",
                "Revise the prologue pacing.",
                EvolveBedsideOptions::default(),
            )
            .await
            .unwrap();
        assert!(!evolved.conflict_detected);
        assert!(bedside_content_of(&evolved).conflicts.is_empty());
    }

    #[tokio::test]
    async fn chapter_evolution_rolls_up_to_project() {
        let engine = engine();
        engine
            .evolve_bedside_note(
                "p1",
                "Mira betrays the crew in the storm chapter.",
                EvolveBedsideOptions {
                    chapter_id: Some("ch7".into()),
                    arc_id: Some("arc2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        engine.drain_rollups().await;

        let project = engine.get_or_create_bedside_note("p1").await.unwrap();
        let content = bedside_content_of(&project);
        assert!(content
            .recent_discoveries
            .iter()
            .any(|d| d.contains("ch7") && d.contains("Mira betrays the crew")));
        assert_eq!(
            project.chain.as_ref().unwrap().change_reason.as_deref(),
            Some("roll_up")
        );
    }

    #[tokio::test]
    async fn seed_from_author_appends_without_overwriting() {
        let engine = engine();

        // Author note carries a standing warning.
        let author = engine.get_or_create_author_bedside_note().await.unwrap();
        let mut author_content = bedside_content_of(&author);
        author_content
            .warnings
            .push("Avoid head-hopping mid-scene".into());
        engine
            .chain
            .evolve_memory(
                &author.id,
                &author.text,
                EvolveOptions {
                    structured: Some(StructuredContent::Bedside(author_content)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Project note has its own warning already.
        let project = engine.get_or_create_bedside_note("p1").await.unwrap();
        let mut project_content = bedside_content_of(&project);
        project_content.warnings.push("Chapter 2 timeline".into());
        engine
            .chain
            .evolve_memory(
                &project.id,
                &project.text,
                EvolveOptions {
                    structured: Some(StructuredContent::Bedside(project_content)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let seeded = engine
            .seed_project_bedside_note_from_author("p1")
            .await
            .unwrap();
        let content = bedside_content_of(&seeded);
        assert!(content.warnings.contains(&"Chapter 2 timeline".to_string()));
        assert!(content
            .warnings
            .contains(&"Avoid head-hopping mid-scene".to_string()));
        assert!(seeded
            .topic_tags
            .contains(&"seeded_from:author_bedside".to_string()));
    }

    #[tokio::test]
    async fn retrospective_folds_into_author_note() {
        let engine = engine();
        let evolved = engine
            .record_project_retrospective("p1", "Slow middles need subplot pressure")
            .await
            .unwrap();

        assert_eq!(evolved.scope, NoteScope::Author);
        assert!(evolved.text.contains("Slow middles need subplot pressure"));
        assert!(evolved
            .topic_tags
            .contains(&"retrospective:project:p1".to_string()));
        assert!(bedside_content_of(&evolved)
            .recent_discoveries
            .iter()
            .any(|d| d.starts_with("Project p1:")));
    }

    #[tokio::test]
    async fn mutations_are_versioned() {
        let engine = engine();
        let v2 = engine
            .apply_mutation(
                "p1",
                SectionMutation {
                    section: BedsideSection::CurrentFocus,
                    action: MutationAction::Set,
                    content: "Finish arc 1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(bedside_content_of(&v2).current_focus, "Finish arc 1");
        assert_eq!(v2.chain_version(), Some(2));

        let v3 = engine
            .apply_mutation(
                "p1",
                SectionMutation {
                    section: BedsideSection::NextSteps,
                    action: MutationAction::Append,
                    content: "Outline chapter 4".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            bedside_content_of(&v3).next_steps,
            vec!["Outline chapter 4".to_string()]
        );
        assert_eq!(v3.chain_version(), Some(3));

        let v4 = engine
            .apply_mutation(
                "p1",
                SectionMutation {
                    section: BedsideSection::NextSteps,
                    action: MutationAction::Remove,
                    content: "Outline chapter 4".into(),
                },
            )
            .await
            .unwrap();
        assert!(bedside_content_of(&v4).next_steps.is_empty());
    }

    #[tokio::test]
    async fn invalid_mutations_rejected() {
        let engine = engine();
        let err = engine
            .apply_mutation(
                "p1",
                SectionMutation {
                    section: BedsideSection::Warnings,
                    action: MutationAction::Set,
                    content: "nope".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidMutation(_)));

        let err = engine
            .apply_mutation(
                "p1",
                SectionMutation {
                    section: BedsideSection::CurrentFocus,
                    action: MutationAction::Append,
                    content: "nope".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidMutation(_)));
    }
}
