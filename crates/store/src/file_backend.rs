//! File-based note store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryNote`. Notes are loaded into memory on
//! creation and flushed to disk on every mutation (put, delete, clear). This
//! gives fast reads with durable writes, and a file an author can inspect.
//!
//! Storage location: `~/.scriptorium/notes.jsonl`

use async_trait::async_trait;
use scriptorium_core::error::StoreError;
use scriptorium_core::note::MemoryNote;
use scriptorium_core::store::{NoteQuery, NoteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed note store using JSONL (one JSON object per line).
pub struct FileStore {
    path: PathBuf,
    notes: Arc<RwLock<Vec<MemoryNote>>>,
}

impl FileStore {
    /// Create a new file-based store at the given path.
    ///
    /// If the file exists, notes are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let notes = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = notes.len(), "File note store loaded");
        Self {
            path,
            notes: Arc::new(RwLock::new(notes)),
        }
    }

    /// Default path: `~/.scriptorium/notes.jsonl`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".scriptorium").join("notes.jsonl")
    }

    fn load_from_disk(path: &PathBuf) -> Vec<MemoryNote> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet — start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryNote>(line) {
                Ok(note) => Some(note),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted note entry");
                    None
                }
            })
            .collect()
    }

    /// Flush all notes to disk as JSONL.
    async fn flush(&self) -> Result<(), StoreError> {
        let notes = self.notes.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create note directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for note in notes.iter() {
            let line = serde_json::to_string(note)
                .map_err(|e| StoreError::Storage(format!("Failed to serialize note: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write note file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl NoteStore for FileStore {
    fn name(&self) -> &str {
        "file"
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
        {
            let mut notes = self.notes.write().await;
            match notes.iter_mut().find(|n| n.id == id) {
                Some(existing) => *existing = note,
                None => notes.push(note),
            }
        }
        self.flush().await?;
        Ok(id)
    }

    async fn bulk_put(&self, incoming: Vec<MemoryNote>) -> Result<(), StoreError> {
        {
            let mut notes = self.notes.write().await;
            for note in incoming {
                match notes.iter_mut().find(|n| n.id == note.id) {
                    Some(existing) => *existing = note,
                    None => notes.push(note),
                }
            }
        }
        self.flush().await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = {
            let mut notes = self.notes.write().await;
            let len_before = notes.len();
            notes.retain(|n| n.id != id);
            notes.len() < len_before
        };
        if deleted {
            self.flush().await?;
        }
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.notes.read().await.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.notes.write().await.clear();
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_core::note::{NoteKind, NoteScope};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn note(text: &str) -> MemoryNote {
        MemoryNote::new(
            NoteScope::Project {
                project_id: "p1".into(),
            },
            NoteKind::Fact,
            text,
        )
    }

    #[tokio::test]
    async fn put_and_get_persists() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp); // Close file so the store can use it

        let store = FileStore::new(path.clone());
        let id = store.put(note("The lighthouse is abandoned")).await.unwrap();

        // Verify file was written
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("lighthouse"));

        // Reload from disk — should find the note
        let store2 = FileStore::new(path);
        let fetched = store2.get(&id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().text, "The lighthouse is abandoned");
    }

    #[tokio::test]
    async fn delete_persists() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = FileStore::new(path.clone());
        let id = store.put(note("to be deleted")).await.unwrap();
        assert!(store.delete(&id).await.unwrap());

        let store2 = FileStore::new(path);
        assert!(store2.get(&id).await.unwrap().is_none());
        assert_eq!(store2.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let path = PathBuf::from("/tmp/scriptorium_test_nonexistent_notes.jsonl");
        let _ = std::fs::remove_file(&path);
        let store = FileStore::new(path);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        let valid = serde_json::to_string(&note("valid note")).unwrap();
        writeln!(tmp, "{valid}").unwrap();
        writeln!(tmp, "this is not json").unwrap();
        let valid2 = serde_json::to_string(&note("another valid note")).unwrap();
        writeln!(tmp, "{valid2}").unwrap();
        let path = tmp.path().to_path_buf();

        let store = FileStore::new(path);
        // Should load 2 valid notes, skip the corrupted line
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn query_after_reload() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = FileStore::new(path.clone());
        store.put(note("chapter one fact")).await.unwrap();
        store.put(note("chapter two fact")).await.unwrap();

        let store2 = FileStore::new(path);
        let results = store2.query(NoteQuery::project("p1")).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
