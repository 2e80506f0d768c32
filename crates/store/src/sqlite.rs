//! SQLite note store — the production backend.
//!
//! A single `notes` table mirrors the flat note collection, with the chain
//! id and project id broken out into indexed columns so chain traversal and
//! per-project queries don't scan the whole table. Tag and bedside filters
//! are applied in Rust after the indexed fetch; they operate on small
//! per-project result sets.

use async_trait::async_trait;
use chrono::Utc;
use scriptorium_core::error::StoreError;
use scriptorium_core::note::{ChainLink, MemoryNote, NoteKind, NoteScope};
use scriptorium_core::store::{NoteQuery, NoteStore, ScopeFilter};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed note store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite note store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id                TEXT PRIMARY KEY,
                scope             TEXT NOT NULL,
                project_id        TEXT,
                kind              TEXT NOT NULL,
                body              TEXT NOT NULL,
                topic_tags        TEXT NOT NULL DEFAULT '[]',
                importance        REAL NOT NULL DEFAULT 0.5,
                structured        TEXT,
                chain_id          TEXT,
                chain_version     INTEGER,
                supersedes        TEXT,
                change_reason     TEXT,
                superseded_by     TEXT,
                conflict_detected INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("notes table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_chain ON notes(chain_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("chain index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_project ON notes(project_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("project index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn kind_to_str(kind: NoteKind) -> &'static str {
        match kind {
            NoteKind::Observation => "observation",
            NoteKind::Issue => "issue",
            NoteKind::Fact => "fact",
            NoteKind::Plan => "plan",
            NoteKind::Preference => "preference",
        }
    }

    fn kind_from_str(s: &str) -> Result<NoteKind, StoreError> {
        match s {
            "observation" => Ok(NoteKind::Observation),
            "issue" => Ok(NoteKind::Issue),
            "fact" => Ok(NoteKind::Fact),
            "plan" => Ok(NoteKind::Plan),
            "preference" => Ok(NoteKind::Preference),
            other => Err(StoreError::QueryFailed(format!("Unknown note kind: {other}"))),
        }
    }

    /// Parse a `MemoryNote` from a SQLite row.
    fn row_to_note(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryNote, StoreError> {
        let col = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| col("id", e))?;
        let scope_str: String = row.try_get("scope").map_err(|e| col("scope", e))?;
        let project_id: Option<String> =
            row.try_get("project_id").map_err(|e| col("project_id", e))?;
        let kind_str: String = row.try_get("kind").map_err(|e| col("kind", e))?;
        let body: String = row.try_get("body").map_err(|e| col("body", e))?;
        let tags_json: String = row.try_get("topic_tags").map_err(|e| col("topic_tags", e))?;
        let importance: f32 = row.try_get("importance").unwrap_or(0.5);
        let structured_json: Option<String> =
            row.try_get("structured").map_err(|e| col("structured", e))?;
        let chain_id: Option<String> = row.try_get("chain_id").map_err(|e| col("chain_id", e))?;
        let chain_version: Option<i64> = row
            .try_get("chain_version")
            .map_err(|e| col("chain_version", e))?;
        let supersedes: Option<String> =
            row.try_get("supersedes").map_err(|e| col("supersedes", e))?;
        let change_reason: Option<String> = row
            .try_get("change_reason")
            .map_err(|e| col("change_reason", e))?;
        let superseded_by: Option<String> = row
            .try_get("superseded_by")
            .map_err(|e| col("superseded_by", e))?;
        let conflict_detected: i64 = row.try_get("conflict_detected").unwrap_or(0);
        let created_at_str: String =
            row.try_get("created_at").map_err(|e| col("created_at", e))?;

        let scope = match scope_str.as_str() {
            "author" => NoteScope::Author,
            "project" => NoteScope::Project {
                project_id: project_id.ok_or_else(|| {
                    StoreError::QueryFailed("project-scoped note missing project_id".into())
                })?,
            },
            other => {
                return Err(StoreError::QueryFailed(format!("Unknown scope: {other}")));
            }
        };

        let topic_tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
        let structured = structured_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok());

        let chain = match (chain_id, chain_version) {
            (Some(chain_id), Some(version)) => Some(ChainLink {
                chain_id,
                version: version as u32,
                supersedes,
                change_reason,
            }),
            _ => None,
        };

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(MemoryNote {
            id,
            scope,
            kind: Self::kind_from_str(&kind_str)?,
            text: body,
            topic_tags,
            importance,
            structured,
            chain,
            superseded_by,
            conflict_detected: conflict_detected != 0,
            created_at,
        })
    }

    async fn upsert(&self, note: &MemoryNote) -> Result<(), StoreError> {
        let (scope_str, project_id) = match &note.scope {
            NoteScope::Project { project_id } => ("project", Some(project_id.clone())),
            NoteScope::Author => ("author", None),
        };
        let tags_json = serde_json::to_string(&note.topic_tags)
            .map_err(|e| StoreError::Storage(format!("Tags serialization: {e}")))?;
        let structured_json = note
            .structured
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Storage(format!("Structured serialization: {e}")))?;
        let link = note.chain.as_ref();

        sqlx::query(
            r#"
            INSERT INTO notes (
                id, scope, project_id, kind, body, topic_tags, importance,
                structured, chain_id, chain_version, supersedes, change_reason,
                superseded_by, conflict_detected, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(id) DO UPDATE SET
                scope = excluded.scope,
                project_id = excluded.project_id,
                kind = excluded.kind,
                body = excluded.body,
                topic_tags = excluded.topic_tags,
                importance = excluded.importance,
                structured = excluded.structured,
                chain_id = excluded.chain_id,
                chain_version = excluded.chain_version,
                supersedes = excluded.supersedes,
                change_reason = excluded.change_reason,
                superseded_by = excluded.superseded_by,
                conflict_detected = excluded.conflict_detected
            "#,
        )
        .bind(&note.id)
        .bind(scope_str)
        .bind(&project_id)
        .bind(Self::kind_to_str(note.kind))
        .bind(&note.text)
        .bind(&tags_json)
        .bind(note.importance)
        .bind(&structured_json)
        .bind(link.map(|l| l.chain_id.clone()))
        .bind(link.map(|l| l.version as i64))
        .bind(link.and_then(|l| l.supersedes.clone()))
        .bind(link.and_then(|l| l.change_reason.clone()))
        .bind(&note.superseded_by)
        .bind(note.conflict_detected as i64)
        .bind(note.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl NoteStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryNote>, StoreError> {
        let row = sqlx::query("SELECT * FROM notes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT by id: {e}")))?;

        row.as_ref().map(Self::row_to_note).transpose()
    }

    async fn query(&self, query: NoteQuery) -> Result<Vec<MemoryNote>, StoreError> {
        // Indexed columns narrow the fetch; the core matcher applies the
        // residual tag/bedside filters on the (small) result set.
        let rows = if let Some(chain_id) = &query.chain_id {
            sqlx::query("SELECT * FROM notes WHERE chain_id = ?1 ORDER BY chain_version ASC")
                .bind(chain_id)
                .fetch_all(&self.pool)
                .await
        } else {
            match &query.scope {
                Some(ScopeFilter::Project(pid)) => {
                    sqlx::query(
                        "SELECT * FROM notes WHERE project_id = ?1 ORDER BY created_at DESC",
                    )
                    .bind(pid)
                    .fetch_all(&self.pool)
                    .await
                }
                Some(ScopeFilter::Author) => {
                    sqlx::query(
                        "SELECT * FROM notes WHERE scope = 'author' ORDER BY created_at DESC",
                    )
                    .fetch_all(&self.pool)
                    .await
                }
                None => {
                    sqlx::query("SELECT * FROM notes ORDER BY created_at DESC")
                        .fetch_all(&self.pool)
                        .await
                }
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("SELECT: {e}")))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let note = Self::row_to_note(row)?;
            if query.matches(&note) {
                results.push(note);
            }
        }
        if query.limit > 0 {
            results.truncate(query.limit);
        }
        Ok(results)
    }

    async fn put(&self, note: MemoryNote) -> Result<String, StoreError> {
        let id = note.id.clone();
        self.upsert(&note).await?;
        debug!("Stored note {id}");
        Ok(id)
    }

    async fn bulk_put(&self, notes: Vec<MemoryNote>) -> Result<(), StoreError> {
        for note in &notes {
            self.upsert(note).await?;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM notes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::QueryFailed(format!("count column: {e}")))?;
        Ok(n as usize)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM notes")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Clear failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_core::bedside::{BedsideNoteContent, StructuredContent};

    async fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    fn note(pid: &str, text: &str) -> MemoryNote {
        MemoryNote::new(
            NoteScope::Project {
                project_id: pid.into(),
            },
            NoteKind::Fact,
            text,
        )
    }

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let store = test_store().await;
        let mut n = note("p1", "Mira distrusts the captain");
        n.add_tag("character:mira");
        n = n.with_importance(0.8);
        let id = store.put(n).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.text, "Mira distrusts the captain");
        assert_eq!(fetched.topic_tags, vec!["character:mira".to_string()]);
        assert!((fetched.importance - 0.8).abs() < 1e-6);
        assert_eq!(fetched.scope.project_id(), Some("p1"));
    }

    #[tokio::test]
    async fn chain_fields_roundtrip() {
        let store = test_store().await;
        let mut n = note("p1", "v2");
        n.chain = Some(ChainLink {
            chain_id: "chain-1".into(),
            version: 2,
            supersedes: Some("prev".into()),
            change_reason: Some("correction".into()),
        });
        let id = store.put(n).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        let link = fetched.chain.unwrap();
        assert_eq!(link.chain_id, "chain-1");
        assert_eq!(link.version, 2);
        assert_eq!(link.supersedes.as_deref(), Some("prev"));
        assert_eq!(link.change_reason.as_deref(), Some("correction"));
    }

    #[tokio::test]
    async fn chain_query_sorted_by_version() {
        let store = test_store().await;
        for version in [3u32, 1, 2] {
            let mut n = note("p1", &format!("v{version}"));
            n.chain = Some(ChainLink {
                chain_id: "c1".into(),
                version,
                supersedes: None,
                change_reason: None,
            });
            store.put(n).await.unwrap();
        }

        let members = store.query(NoteQuery::chain("c1")).await.unwrap();
        let versions: Vec<u32> = members.iter().filter_map(|n| n.chain_version()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn structured_content_roundtrip() {
        let store = test_store().await;
        let mut n = MemoryNote::new(
            NoteScope::Project {
                project_id: "p1".into(),
            },
            NoteKind::Plan,
            "standing plan",
        );
        n.structured = Some(StructuredContent::Bedside(BedsideNoteContent {
            current_focus: "arc 1 rewrite".into(),
            ..Default::default()
        }));
        let id = store.put(n).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert!(fetched.is_bedside());

        // Bedside-only query finds it
        let results = store
            .query(NoteQuery::project("p1").with_kind(NoteKind::Plan).bedside())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn scope_queries_are_disjoint() {
        let store = test_store().await;
        store.put(note("p1", "project fact")).await.unwrap();
        store
            .put(MemoryNote::new(
                NoteScope::Author,
                NoteKind::Preference,
                "dislikes adverbs",
            ))
            .await
            .unwrap();

        assert_eq!(store.query(NoteQuery::project("p1")).await.unwrap().len(), 1);
        assert_eq!(store.query(NoteQuery::author()).await.unwrap().len(), 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = test_store().await;
        let id = store.put(note("p1", "gone soon")).await.unwrap();
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());

        store.put(note("p1", "a")).await.unwrap();
        store.put(note("p1", "b")).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
