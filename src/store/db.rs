//! Document store trait and SQLite implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::StoreError;
use super::schema;
use super::types::{SyncRunRecord, SyncRunStats};
use crate::dates;
use crate::record::{Entity, RecordId};
use crate::schema::EntityKind;

/// Persistence used by the sync engine.
///
/// Object-safe so it can be shared as `Arc<dyn DocumentStore>` across the
/// concurrent page tasks of a run.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ids of documents whose `date_created` lies within `[from, to]`,
    /// both bounds inclusive.
    async fn ids_created_between(
        &self,
        collection: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashSet<RecordId>, StoreError>;

    /// Replace the document with this id, or insert it if absent.
    async fn upsert_by_id(
        &self,
        collection: &str,
        id: &RecordId,
        document: &Entity,
    ) -> Result<(), StoreError>;

    async fn find_by_id(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<Entity>, StoreError>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Start a new sync run and return its ID.
    async fn start_sync_run(&self, kind: EntityKind) -> Result<i64, StoreError>;

    /// Complete a sync run with statistics.
    async fn complete_sync_run(&self, run_id: i64, stats: &SyncRunStats)
        -> Result<(), StoreError>;

    /// Most recent runs first.
    async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRunRecord>, StoreError>;
}

/// SQLite implementation of the document store.
pub struct SqliteDocumentStore {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteDocumentStore {
    /// Open or create a store at the given path.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path_clone.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            let conn = Connection::open(&path_clone).map_err(|e| StoreError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            // WAL keeps the status command readable while a sync writes.
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StoreError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StoreError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory store (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn ids_created_between(
        &self,
        collection: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashSet<RecordId>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare_cached(
                "SELECT id FROM documents WHERE collection = ?1 AND date_created >= ?2 AND date_created <= ?3",
            )
            .map_err(StoreError::query)?;

        let keys = stmt
            .query_map(
                rusqlite::params![collection, from.timestamp_millis(), to.timestamp_millis()],
                |row| row.get::<_, String>(0),
            )
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(keys
            .iter()
            .filter_map(|key| RecordId::from_key(key))
            .collect())
    }

    async fn upsert_by_id(
        &self,
        collection: &str,
        id: &RecordId,
        document: &Entity,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(document).map_err(|source| StoreError::Serialization {
            collection: collection.to_string(),
            source,
        })?;
        let date_created = document
            .get("date_created")
            .and_then(dates::read_timestamp)
            .map(|dt| dt.timestamp_millis());
        let updated_at = Utc::now().timestamp();

        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO documents (collection, id, date_created, body, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(collection, id) DO UPDATE SET
                date_created = excluded.date_created,
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![collection, id.to_key(), date_created, body, updated_at],
        )
        .map_err(StoreError::query)?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<Entity>, StoreError> {
        let body: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id.to_key()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::query)?
        };

        body.map(|b| {
            serde_json::from_str::<Entity>(&b).map_err(|source| StoreError::Serialization {
                collection: collection.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )
            .map_err(StoreError::query)?;
        Ok(count as u64)
    }

    async fn start_sync_run(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let started_at = Utc::now().timestamp();
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sync_runs (entity_kind, started_at) VALUES (?1, ?2)",
            rusqlite::params![kind.as_str(), started_at],
        )
        .map_err(StoreError::query)?;

        Ok(conn.last_insert_rowid())
    }

    async fn complete_sync_run(
        &self,
        run_id: i64,
        stats: &SyncRunStats,
    ) -> Result<(), StoreError> {
        let completed_at = Utc::now().timestamp();
        let failures = if stats.failures.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&stats.failures).map_err(|source| {
                StoreError::Serialization {
                    collection: "sync_runs".to_string(),
                    source,
                }
            })?)
        };

        let conn = self.lock()?;

        conn.execute(
            "UPDATE sync_runs SET completed_at = ?1, pages_total = ?2, pages_failed = ?3, written = ?4, skipped = ?5, failed_records = ?6, interrupted = ?7, failures = ?8 WHERE id = ?9",
            rusqlite::params![
                completed_at,
                stats.pages_total as i64,
                stats.pages_failed as i64,
                stats.written as i64,
                stats.skipped as i64,
                stats.failed_records as i64,
                i64::from(stats.interrupted),
                failures,
                run_id,
            ],
        )
        .map_err(StoreError::query)?;

        Ok(())
    }

    async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRunRecord>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare_cached(
                "SELECT id, entity_kind, started_at, completed_at, pages_total, pages_failed, written, skipped, failed_records, interrupted, failures FROM sync_runs ORDER BY id DESC LIMIT ?1",
            )
            .map_err(StoreError::query)?;

        let runs = stmt
            .query_map([limit], |row| Ok(row_to_sync_run(row)))
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(runs)
    }
}

/// Convert a database row to a SyncRunRecord.
fn row_to_sync_run(row: &rusqlite::Row<'_>) -> SyncRunRecord {
    let id: i64 = row.get(0).unwrap_or_default();
    let kind: String = row.get(1).unwrap_or_default();
    let started_at: i64 = row.get(2).unwrap_or(0);
    let completed_at = row.get::<_, Option<i64>>(3).ok().flatten();
    let failures = row.get::<_, Option<String>>(10).ok().flatten();

    let count = |idx: usize| row.get::<_, i64>(idx).unwrap_or(0) as u64;

    SyncRunRecord {
        id,
        kind: EntityKind::from_str(&kind),
        started_at: Utc
            .timestamp_opt(started_at, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH),
        completed_at: completed_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        stats: SyncRunStats {
            pages_total: count(4),
            pages_failed: count(5),
            written: count(6),
            skipped: count(7),
            failed_records: count(8),
            interrupted: count(9) != 0,
            failures: failures
                .and_then(|f| serde_json::from_str(&f).ok())
                .unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("wc-migrate")
            .join("store_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn doc(value: serde_json::Value) -> Entity {
        serde_json::from_value(value).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        dates::parse_timestamp(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_file_and_parent_dirs() {
        let dir = test_dir("open_creates");
        let path = dir.join("nested").join("store.db");
        let store = SqliteDocumentStore::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let id = RecordId::Int(7);

        store
            .upsert_by_id("orders", &id, &doc(json!({"id": 7, "status": "pending"})))
            .await
            .unwrap();
        store
            .upsert_by_id("orders", &id, &doc(json!({"id": 7, "total": "9.99"})))
            .await
            .unwrap();

        assert_eq!(store.count("orders").await.unwrap(), 1);
        let stored = store.find_by_id("orders", &id).await.unwrap().unwrap();
        // Whole-document replacement: the old field is gone.
        assert_eq!(stored, doc(json!({"id": 7, "total": "9.99"})));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let id = RecordId::Int(1);
        store
            .upsert_by_id("orders", &id, &doc(json!({"id": 1})))
            .await
            .unwrap();
        assert_eq!(store.count("products").await.unwrap(), 0);
        assert!(store.find_by_id("products", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_created_between_is_inclusive() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let fixtures = [
            (1, "2023-12-31T23:59:59"),
            (2, "2024-01-01T00:00:00"),
            (3, "2024-01-01T12:00:00"),
            (4, "2024-01-02T00:00:00"),
            (5, "2024-01-02T00:00:01"),
        ];
        for (id, created) in fixtures {
            let created = dates::to_structured(&utc(created));
            store
                .upsert_by_id(
                    "orders",
                    &RecordId::Int(id),
                    &doc(json!({"id": id, "date_created": created})),
                )
                .await
                .unwrap();
        }
        // No creation date: never part of a window.
        store
            .upsert_by_id("orders", &RecordId::Int(6), &doc(json!({"id": 6})))
            .await
            .unwrap();

        let ids = store
            .ids_created_between(
                "orders",
                utc("2024-01-01T00:00:00"),
                utc("2024-01-02T00:00:00"),
            )
            .await
            .unwrap();
        let expected: HashSet<RecordId> = [2, 3, 4].into_iter().map(RecordId::Int).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_ids_created_between_empty() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let ids = store
            .ids_created_between(
                "vendors",
                utc("2024-01-01T00:00:00"),
                utc("2024-01-02T00:00:00"),
            )
            .await
            .unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_string_ids_round_trip() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let id = RecordId::Str("42".into());
        store
            .upsert_by_id(
                "vendors",
                &id,
                &doc(json!({"id": "42", "date_created": {"$date": "2024-01-01T10:00:00.000Z"}})),
            )
            .await
            .unwrap();
        let ids = store
            .ids_created_between(
                "vendors",
                utc("2024-01-01T00:00:00"),
                utc("2024-01-02T00:00:00"),
            )
            .await
            .unwrap();
        assert!(ids.contains(&id));
        assert!(!ids.contains(&RecordId::Int(42)));
    }

    #[tokio::test]
    async fn test_sync_run_lifecycle() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let run_id = store.start_sync_run(EntityKind::Orders).await.unwrap();
        assert!(run_id > 0);

        let stats = SyncRunStats {
            pages_total: 5,
            pages_failed: 1,
            written: 400,
            skipped: 0,
            failed_records: 2,
            interrupted: false,
            failures: vec!["page 3: HTTP 500".to_string()],
        };
        store.complete_sync_run(run_id, &stats).await.unwrap();

        let runs = store.recent_sync_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.id, run_id);
        assert_eq!(run.kind, Some(EntityKind::Orders));
        assert!(run.completed_at.is_some());
        assert_eq!(run.stats.pages_total, 5);
        assert_eq!(run.stats.written, 400);
        assert_eq!(run.stats.failures, vec!["page 3: HTTP 500".to_string()]);
    }

    #[tokio::test]
    async fn test_recent_sync_runs_newest_first() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let first = store.start_sync_run(EntityKind::Orders).await.unwrap();
        let second = store.start_sync_run(EntityKind::Products).await.unwrap();

        let runs = store.recent_sync_runs(1).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, second);
        assert!(runs[0].completed_at.is_none());

        let runs = store.recent_sync_runs(10).await.unwrap();
        assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second, first]);
    }
}
