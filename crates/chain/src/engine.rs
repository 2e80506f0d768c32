//! Chain engine — builds, reads, and extends supersession chains.
//!
//! A chain is a strictly ordered sequence of note versions sharing one chain
//! id. Evolution is append-only: the new version records what it supersedes,
//! the old latest gains a `superseded_by` pointer, and nothing else about
//! prior versions ever changes. Chain evolution is a read-modify-write
//! against the store; callers that need protection against concurrent
//! evolution of the same chain pass `expected_version`.

use std::sync::Arc;

use scriptorium_core::error::{ChainError, StoreError};
use scriptorium_core::note::{ChainLink, ChainedMemory, ChangeType, MemoryNote};
use scriptorium_core::store::{NoteQuery, NoteStore};
use tracing::debug;
use uuid::Uuid;

/// Options for [`ChainEngine::evolve_memory`].
#[derive(Debug, Clone, Default)]
pub struct EvolveOptions {
    /// Recorded on the new version's chain link (e.g. `roll_up`).
    pub change_reason: Option<String>,
    /// Replaces the structured payload; `None` carries the prior one forward.
    pub structured: Option<scriptorium_core::bedside::StructuredContent>,
    /// Optimistic concurrency check: reject if the chain's current latest
    /// version differs.
    pub expected_version: Option<u32>,
    /// Extra semantic tags for the new version.
    pub extra_tags: Vec<String>,
    /// Marks the new version as carrying detected conflicts.
    pub conflict_detected: bool,
}

/// Summary of one chain within a project.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub chain_id: String,
    pub versions: usize,
}

/// Evolution summary for a note or chain.
#[derive(Debug, Clone)]
pub struct ChainEvolution {
    /// Topic string derived from the earliest version's text.
    pub topic: String,
    pub versions: usize,
    /// One line per version, oldest first.
    pub timeline: Vec<String>,
    pub current_text: String,
}

/// The chain engine. Cheap to clone — holds only the store handle.
#[derive(Clone)]
pub struct ChainEngine {
    store: Arc<dyn NoteStore>,
}

/// Max snippet length used in timelines and topics.
const SNIPPET_LEN: usize = 60;

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(SNIPPET_LEN).collect();
    if trimmed.chars().count() > SNIPPET_LEN {
        out.push('…');
    }
    out
}

impl ChainEngine {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    /// Start a chain at an existing standalone note.
    ///
    /// Fails with `NotFound` if the note does not resolve. Calling this twice
    /// on the same note creates inconsistent state — idempotency is the
    /// caller's contract, not guarded here.
    pub async fn create_memory_chain(
        &self,
        note_id: &str,
        topic_hint: Option<&str>,
    ) -> Result<String, ChainError> {
        let mut note = self
            .store
            .get(note_id)
            .await?
            .ok_or_else(|| ChainError::NotFound(note_id.to_string()))?;

        let chain_id = Uuid::new_v4().to_string();
        note.chain = Some(ChainLink {
            chain_id: chain_id.clone(),
            version: 1,
            supersedes: None,
            change_reason: None,
        });
        if let Some(hint) = topic_hint {
            note.add_tag(format!("topic:{hint}"));
        }
        self.store.put(note).await?;
        debug!(note_id, chain_id, "Created memory chain");
        Ok(chain_id)
    }

    /// Append a new version superseding the chain's current latest.
    ///
    /// If the note has no chain yet, one is created with the prior note as
    /// version 1. Returns the new note.
    pub async fn evolve_memory(
        &self,
        note_id: &str,
        new_text: &str,
        options: EvolveOptions,
    ) -> Result<MemoryNote, ChainError> {
        let prior = self
            .store
            .get(note_id)
            .await?
            .ok_or_else(|| ChainError::NotFound(note_id.to_string()))?;

        // Resolve the chain's latest member; implicitly chain the note if bare.
        let (chain_id, latest) = match &prior.chain {
            Some(link) => {
                let chain_id = link.chain_id.clone();
                let latest = self
                    .latest_member(&chain_id)
                    .await?
                    .unwrap_or_else(|| prior.clone());
                (chain_id, latest)
            }
            None => {
                let chain_id = Uuid::new_v4().to_string();
                let mut first = prior.clone();
                first.chain = Some(ChainLink {
                    chain_id: chain_id.clone(),
                    version: 1,
                    supersedes: None,
                    change_reason: None,
                });
                self.store.put(first.clone()).await?;
                (chain_id, first)
            }
        };

        let latest_version = latest.chain_version().unwrap_or(1);
        if let Some(expected) = options.expected_version {
            if latest_version != expected {
                return Err(ChainError::VersionConflict {
                    expected,
                    actual: latest_version,
                });
            }
        }

        let mut next = MemoryNote::new(latest.scope.clone(), latest.kind, new_text)
            .with_importance(latest.importance)
            .with_tags(latest.topic_tags.iter().cloned())
            .with_tags(options.extra_tags);
        next.structured = options.structured.or_else(|| latest.structured.clone());
        next.conflict_detected = options.conflict_detected;
        next.chain = Some(ChainLink {
            chain_id: chain_id.clone(),
            version: latest_version + 1,
            supersedes: Some(latest.id.clone()),
            change_reason: options.change_reason,
        });

        let mut superseded = latest;
        superseded.superseded_by = Some(next.id.clone());

        // One bulk write: the superseded pointer and the new version land
        // together or the store error propagates untouched.
        self.store
            .bulk_put(vec![superseded, next.clone()])
            .await?;

        debug!(
            chain_id,
            version = latest_version + 1,
            "Evolved memory chain"
        );
        Ok(next)
    }

    /// All members of the chain containing `id_or_chain_id`, sorted by
    /// version ascending. Accepts either a member note id or a bare chain id.
    /// Returns an empty list for chainless or unknown ids.
    pub async fn get_memory_chain(
        &self,
        id_or_chain_id: &str,
    ) -> Result<Vec<ChainedMemory>, ChainError> {
        let chain_id = match self.resolve_chain_id(id_or_chain_id).await? {
            Some(chain_id) => chain_id,
            None => return Ok(Vec::new()),
        };

        let mut members = self.store.query(NoteQuery::chain(&chain_id)).await?;
        members.sort_by_key(|n| n.chain_version().unwrap_or(0));
        Ok(members.iter().filter_map(ChainedMemory::from_note).collect())
    }

    /// The highest-version member of the note's chain, or `None` if the note
    /// has no chain or does not exist.
    pub async fn get_latest_in_chain(
        &self,
        note_id: &str,
    ) -> Result<Option<MemoryNote>, ChainError> {
        let chain_id = match self.resolve_chain_id(note_id).await? {
            Some(chain_id) => chain_id,
            None => return Ok(None),
        };
        self.latest_member(&chain_id).await
    }

    /// Evolution summary for a note: a one-entry summary for a chainless
    /// note, or the full version timeline for a chain.
    pub async fn get_chain_evolution(&self, note_id: &str) -> Result<ChainEvolution, ChainError> {
        let note = self
            .store
            .get(note_id)
            .await?
            .ok_or_else(|| ChainError::NotFound(note_id.to_string()))?;

        let members = self.get_memory_chain(note_id).await?;
        if members.is_empty() {
            return Ok(ChainEvolution {
                topic: snippet(&note.text),
                versions: 1,
                timeline: vec![format!("Initial: {}", snippet(&note.text))],
                current_text: note.text,
            });
        }

        let timeline: Vec<String> = members
            .iter()
            .map(|m| match m.change_type {
                ChangeType::Initial => format!("Initial: {}", snippet(&m.text)),
                ChangeType::Supersede => format!("supersede: {}", snippet(&m.text)),
            })
            .collect();

        Ok(ChainEvolution {
            topic: snippet(&members[0].text),
            versions: members.len(),
            timeline,
            current_text: members
                .last()
                .map(|m| m.text.clone())
                .unwrap_or_default(),
        })
    }

    /// Distinct chains among a project's notes with member counts.
    pub async fn get_all_chains(&self, project_id: &str) -> Result<Vec<ChainSummary>, ChainError> {
        let notes = self.store.query(NoteQuery::project(project_id)).await?;
        let mut summaries: Vec<ChainSummary> = Vec::new();
        for note in &notes {
            let Some(link) = &note.chain else { continue };
            match summaries.iter_mut().find(|s| s.chain_id == link.chain_id) {
                Some(summary) => summary.versions += 1,
                None => summaries.push(ChainSummary {
                    chain_id: link.chain_id.clone(),
                    versions: 1,
                }),
            }
        }
        Ok(summaries)
    }

    /// Render a note's chain for prompt injection.
    pub async fn format_chain_for_prompt(&self, note_id: &str) -> Result<String, ChainError> {
        let evolution = self.get_chain_evolution(note_id).await?;
        if evolution.versions <= 1 {
            return Ok(format!("[Memory] {}", evolution.current_text));
        }

        let mut out = format!(
            "[Evolving Memory - {} versions]\nLatest: {}\nEvolution:\n",
            evolution.versions, evolution.current_text
        );
        out.push_str(&evolution.timeline.join("\n"));
        Ok(out)
    }

    /// The note that supersedes this one, if any.
    pub async fn get_successor(&self, note_id: &str) -> Result<Option<MemoryNote>, ChainError> {
        let note = match self.store.get(note_id).await? {
            Some(note) => note,
            None => return Ok(None),
        };
        match note.superseded_by {
            Some(successor_id) => Ok(self.store.get(&successor_id).await?),
            None => Ok(None),
        }
    }

    /// Map a member note id or bare chain id to the chain id.
    async fn resolve_chain_id(&self, id: &str) -> Result<Option<String>, StoreError> {
        if let Some(note) = self.store.get(id).await? {
            return Ok(note.chain.map(|c| c.chain_id));
        }
        // Not a note id — treat as a chain id if any member exists.
        let members = self.store.query(NoteQuery::chain(id)).await?;
        Ok(if members.is_empty() {
            None
        } else {
            Some(id.to_string())
        })
    }

    async fn latest_member(&self, chain_id: &str) -> Result<Option<MemoryNote>, ChainError> {
        let members = self.store.query(NoteQuery::chain(chain_id)).await?;
        Ok(members
            .into_iter()
            .max_by_key(|n| n.chain_version().unwrap_or(0)))
    }
}
