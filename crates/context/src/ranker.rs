//! Relevance ranking of notes for prompt assembly.

use std::sync::Arc;

use scriptorium_core::error::Result;
use scriptorium_core::note::MemoryNote;
use scriptorium_core::store::{NoteQuery, NoteStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ENTITY_WEIGHT: u32 = 2;
const KEYWORD_WEIGHT: u32 = 1;

/// Signals from the current editing context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSignals {
    /// Names of entities active near the cursor (e.g. from the entity graph).
    pub active_entity_names: Vec<String>,
    /// Keywords from the user's current selection.
    pub selection_keywords: Vec<String>,
}

impl ContextSignals {
    pub fn is_empty(&self) -> bool {
        self.active_entity_names.is_empty() && self.selection_keywords.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RankerOptions {
    /// Truncates the ranked project list; never applied before ranking.
    pub limit: Option<usize>,
}

/// The ranker's answer: author notes complete, project notes ranked.
#[derive(Debug, Clone)]
pub struct RelevantMemories {
    pub author: Vec<MemoryNote>,
    pub project: Vec<MemoryNote>,
}

/// Scores and orders project notes against context signals.
///
/// Author-scoped notes are always returned in full: cross-project knowledge
/// is small and universally applicable, so filtering it risks hiding
/// information for no real savings.
#[derive(Clone)]
pub struct RelevanceRanker {
    store: Arc<dyn NoteStore>,
}

impl RelevanceRanker {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    pub async fn relevant_memories_for_context(
        &self,
        project_id: &str,
        signals: &ContextSignals,
        options: RankerOptions,
    ) -> Result<RelevantMemories> {
        let author = self.store.query(NoteQuery::author()).await?;
        let project_notes = self.store.query(NoteQuery::project(project_id)).await?;

        let mut scored: Vec<(u32, MemoryNote)> = project_notes
            .into_iter()
            .map(|note| (score_note(&note, signals), note))
            .collect();

        let any_match = scored.iter().any(|(score, _)| *score > 0);
        if !any_match && !scored.is_empty() {
            // No relevance signal may ever hide knowledge from the agent.
            debug!(project_id, "No relevance matches; returning all project notes");
        }

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .cmp(score_a)
                .then_with(|| {
                    b.importance
                        .partial_cmp(&a.importance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let mut project: Vec<MemoryNote> = if any_match {
            scored
                .into_iter()
                .filter(|(score, _)| *score > 0)
                .map(|(_, note)| note)
                .collect()
        } else {
            scored.into_iter().map(|(_, note)| note).collect()
        };

        if let Some(limit) = options.limit {
            project.truncate(limit);
        }

        Ok(RelevantMemories { author, project })
    }
}

fn score_note(note: &MemoryNote, signals: &ContextSignals) -> u32 {
    let text = note.text.to_lowercase();
    let tags: Vec<String> = note.topic_tags.iter().map(|t| t.to_lowercase()).collect();

    let mut score = 0;
    for name in &signals.active_entity_names {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let tag_hit = tags
            .iter()
            .any(|t| t.contains(&needle) || *t == format!("character:{needle}"));
        if tag_hit || text.contains(&needle) {
            score += ENTITY_WEIGHT;
        }
    }
    for keyword in &signals.selection_keywords {
        let needle = keyword.trim().to_lowercase();
        if !needle.is_empty() && text.contains(&needle) {
            score += KEYWORD_WEIGHT;
        }
    }
    score
}
