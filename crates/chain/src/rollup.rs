//! Background roll-up of chapter-level bedside updates into arc- and
//! project-level bedside notes.
//!
//! Roll-up is deliberately not inline with the chapter-level write: the
//! primary write must never wait on (or fail because of) fan-out into upper
//! scopes. Jobs go onto an unbounded channel; a worker applies each with
//! bounded retries and drops it with a warning after the last attempt.
//! Upper-scope notes receive a derived one-line summary, not the full
//! chapter text, so they don't grow unboundedly with chapter churn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scriptorium_core::error::ChainError;
use scriptorium_core::note::NoteScope;
use scriptorium_core::store::NoteStore;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::bedside::{self, bedside_content_of};
use crate::engine::{ChainEngine, EvolveOptions};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 25;

/// One pending roll-up from a chapter-level bedside write.
#[derive(Debug, Clone)]
pub struct RollupJob {
    pub project_id: String,
    pub chapter_id: String,
    pub arc_id: Option<String>,
    /// Derived summary carried into upper scopes.
    pub summary: String,
}

/// Queue handle. Cloning shares the same worker.
#[derive(Clone)]
pub struct RollupQueue {
    tx: mpsc::UnboundedSender<RollupJob>,
    pending: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl RollupQueue {
    /// Spawn the worker task and return the queue handle.
    pub fn start(store: Arc<dyn NoteStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RollupJob>();
        let pending = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());

        let worker_pending = pending.clone();
        let worker_notify = notify.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let mut applied = false;
                for attempt in 1..=MAX_ATTEMPTS {
                    match apply_rollup(&store, &job).await {
                        Ok(()) => {
                            applied = true;
                            break;
                        }
                        Err(e) => {
                            warn!(
                                attempt,
                                chapter_id = %job.chapter_id,
                                error = %e,
                                "Roll-up attempt failed"
                            );
                            tokio::time::sleep(Duration::from_millis(
                                RETRY_BASE_DELAY_MS * attempt as u64,
                            ))
                            .await;
                        }
                    }
                }
                if !applied {
                    warn!(chapter_id = %job.chapter_id, "Roll-up dropped after retries");
                }
                worker_pending.fetch_sub(1, Ordering::SeqCst);
                worker_notify.notify_waiters();
            }
        });

        Self {
            tx,
            pending,
            notify,
        }
    }

    /// Enqueue a job. Never blocks and never fails the caller.
    pub fn enqueue(&self, job: RollupJob) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("Roll-up worker is gone; job dropped");
        }
    }

    /// Wait until every enqueued job has been processed.
    pub async fn idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Apply one roll-up: evolve the arc-level note (if an arc is named), then
/// the project-level note, each with the derived summary.
async fn apply_rollup(store: &Arc<dyn NoteStore>, job: &RollupJob) -> Result<(), ChainError> {
    let chain = ChainEngine::new(store.clone());
    let scope = NoteScope::Project {
        project_id: job.project_id.clone(),
    };

    let mut targets: Vec<Option<String>> = Vec::new();
    if let Some(arc_id) = &job.arc_id {
        targets.push(Some(format!("arc:{arc_id}")));
    }
    targets.push(None); // project level

    for qualifier in targets {
        let note =
            bedside::get_or_create_scoped(store, scope.clone(), qualifier.as_deref()).await?;
        let mut content = bedside_content_of(&note);
        let line = format!("Roll-up from chapter {}: {}", job.chapter_id, job.summary);
        if !content.recent_discoveries.contains(&line) {
            content.recent_discoveries.push(line);
        }

        chain
            .evolve_memory(
                &note.id,
                &note.text,
                EvolveOptions {
                    change_reason: Some("roll_up".into()),
                    structured: Some(scriptorium_core::bedside::StructuredContent::Bedside(
                        content,
                    )),
                    ..Default::default()
                },
            )
            .await?;
        debug!(
            project_id = %job.project_id,
            qualifier = qualifier.as_deref().unwrap_or("project"),
            "Applied roll-up"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_store::InMemoryStore;

    #[tokio::test]
    async fn idle_returns_immediately_when_empty() {
        let store: Arc<dyn NoteStore> = Arc::new(InMemoryStore::new());
        let queue = RollupQueue::start(store);
        queue.idle().await;
    }

    #[tokio::test]
    async fn rollup_creates_and_updates_project_note() {
        let store: Arc<dyn NoteStore> = Arc::new(InMemoryStore::new());
        let queue = RollupQueue::start(store.clone());

        queue.enqueue(RollupJob {
            project_id: "p1".into(),
            chapter_id: "ch3".into(),
            arc_id: Some("arc1".into()),
            summary: "Seth loses the sword".into(),
        });
        queue.idle().await;

        let scope = NoteScope::Project {
            project_id: "p1".into(),
        };
        let project_note = bedside::get_or_create_scoped(&store, scope.clone(), None)
            .await
            .unwrap();
        let content = bedside_content_of(&project_note);
        assert!(content
            .recent_discoveries
            .iter()
            .any(|d| d.contains("ch3") && d.contains("loses the sword")));
        assert_eq!(
            project_note.chain.as_ref().unwrap().change_reason.as_deref(),
            Some("roll_up")
        );

        let arc_note = bedside::get_or_create_scoped(&store, scope, Some("arc:arc1"))
            .await
            .unwrap();
        assert!(bedside_content_of(&arc_note)
            .recent_discoveries
            .iter()
            .any(|d| d.contains("ch3")));
    }
}
