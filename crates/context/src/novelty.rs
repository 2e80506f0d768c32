//! Session-scoped novelty filter for proactively surfaced lore entities.
//!
//! The tracker is an owned object, one per editing session: tests and
//! concurrent sessions get independent state, and "reset" is dropping or
//! explicitly clearing the instance rather than poking process globals.

use std::collections::HashSet;

use scriptorium_analysis::EntityNode;
use tracing::debug;

/// Entities mentioned fewer times than this are treated as noise.
const MIN_MENTIONS: usize = 2;

/// Tracks which lore entity candidates have already been surfaced or
/// dismissed in this session.
#[derive(Debug, Default)]
pub struct LoreTracker {
    dismissed: HashSet<String>,
    surfaced: HashSet<String>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl LoreTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter candidates down to the ones worth surfacing now.
    ///
    /// Drops low-mention noise, names already present in the lore graph,
    /// dismissed names, and anything surfaced earlier in this session. What
    /// remains is recorded as surfaced, so each name is emitted at most once
    /// until [`reset`](Self::reset).
    pub fn filter_novel_lore_entities(
        &mut self,
        candidates: &[EntityNode],
        existing_graph_names: &[String],
    ) -> Vec<EntityNode> {
        let known: HashSet<String> = existing_graph_names.iter().map(|n| normalize(n)).collect();

        let mut novel = Vec::new();
        for candidate in candidates {
            let name = normalize(&candidate.name);
            if candidate.mention_count < MIN_MENTIONS
                || known.contains(&name)
                || self.dismissed.contains(&name)
                || self.surfaced.contains(&name)
            {
                continue;
            }
            self.surfaced.insert(name);
            novel.push(candidate.clone());
        }

        if !novel.is_empty() {
            debug!(count = novel.len(), "Surfacing novel lore entities");
        }
        novel
    }

    /// Permanently exclude a name (until reset), across all future calls.
    pub fn mark_lore_entity_dismissed(&mut self, name: &str) {
        self.dismissed.insert(normalize(name));
    }

    /// Forget all dismissal and surfacing state.
    pub fn reset_lore_entity_tracking(&mut self) {
        self.dismissed.clear();
        self.surfaced.clear();
    }
}
