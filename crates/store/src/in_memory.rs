//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use scriptorium_core::error::StoreError;
use scriptorium_core::note::MemoryNote;
use scriptorium_core::store::{NoteQuery, NoteStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory store that keeps notes in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    notes: Arc<RwLock<Vec<MemoryNote>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            notes: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryNote>, StoreError> {
        let notes = self.notes.read().await;
        Ok(notes.iter().find(|n| n.id == id).cloned())
    }

    async fn query(&self, query: NoteQuery) -> Result<Vec<MemoryNote>, StoreError> {
        let notes = self.notes.read().await;
        let mut results: Vec<MemoryNote> =
            notes.iter().filter(|n| query.matches(n)).cloned().collect();
        if query.limit > 0 {
            results.truncate(query.limit);
        }
        Ok(results)
    }

    async fn put(&self, note: MemoryNote) -> Result<String, StoreError> {
        let id = note.id.clone();
        let mut notes = self.notes.write().await;
        match notes.iter_mut().find(|n| n.id == id) {
            Some(existing) => *existing = note,
            None => notes.push(note),
        }
        Ok(id)
    }

    async fn bulk_put(&self, incoming: Vec<MemoryNote>) -> Result<(), StoreError> {
        let mut notes = self.notes.write().await;
        for note in incoming {
            match notes.iter_mut().find(|n| n.id == note.id) {
                Some(existing) => *existing = note,
                None => notes.push(note),
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut notes = self.notes.write().await;
        let len_before = notes.len();
        notes.retain(|n| n.id != id);
        Ok(notes.len() < len_before)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.notes.read().await.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.notes.write().await.clear();
        Ok(())
    }
}
