//! SQLite-backed item store.

use super::ItemStore;
use crate::error::{OppsumError, Result};
use crate::model::{ArtifactRef, ErrorKind, Item, StageStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, instrument};

/// SQLite-backed item store.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    title TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL,
    has_captions INTEGER NOT NULL,
    upload_date TEXT NOT NULL,
    stage_status TEXT NOT NULL,
    working_artifact_ref TEXT,
    error_kind TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_job_id ON items(job_id);
CREATE INDEX IF NOT EXISTS idx_items_stage_status ON items(stage_status);
"#;

impl SqliteItemStore {
    /// Open (or create) the item database at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for concurrent worker access
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized item store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory item store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
        let status: String = row.get(6)?;
        let artifact: Option<String> = row.get(7)?;
        let error: Option<String> = row.get(8)?;
        let updated_at: String = row.get(9)?;

        Ok(Item {
            item_id: row.get(0)?,
            job_id: row.get(1)?,
            title: row.get(2)?,
            duration_seconds: row.get(3)?,
            has_captions: row.get::<_, i64>(4)? != 0,
            upload_date: row.get(5)?,
            stage_status: status.parse().unwrap_or(StageStatus::Failed),
            working_artifact_ref: artifact.map(ArtifactRef::new),
            error_kind: error.and_then(|e| e.parse::<ErrorKind>().ok()),
            updated_at: updated_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    #[instrument(skip(self, item), fields(item_id = %item.item_id))]
    async fn upsert_item(&self, item: &Item) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| OppsumError::Store(format!("Failed to acquire lock: {}", e)))?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO items
            (item_id, job_id, title, duration_seconds, has_captions, upload_date,
             stage_status, working_artifact_ref, error_kind, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                item.item_id,
                item.job_id,
                item.title,
                item.duration_seconds,
                item.has_captions as i64,
                item.upload_date,
                item.stage_status.as_str(),
                item.working_artifact_ref.as_ref().map(|r| r.as_str()),
                item.error_kind.map(|k| k.as_str()),
                item.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<Item>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| OppsumError::Store(format!("Failed to acquire lock: {}", e)))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT item_id, job_id, title, duration_seconds, has_captions, upload_date,
                   stage_status, working_artifact_ref, error_kind, updated_at
            FROM items WHERE item_id = ?1
            "#,
        )?;

        let mut rows = stmt.query_map(params![item_id], Self::row_to_item)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn list_items(&self, job_id: Option<&str>) -> Result<Vec<Item>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| OppsumError::Store(format!("Failed to acquire lock: {}", e)))?;

        let base = r#"
            SELECT item_id, job_id, title, duration_seconds, has_captions, upload_date,
                   stage_status, working_artifact_ref, error_kind, updated_at
            FROM items
        "#;

        let items = match job_id {
            Some(job) => {
                let mut stmt =
                    conn.prepare(&format!("{} WHERE job_id = ?1 ORDER BY updated_at DESC", base))?;
                let rows = stmt.query_map(params![job], Self::row_to_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY updated_at DESC", base))?;
                let rows = stmt.query_map([], Self::row_to_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(items)
    }

    #[instrument(skip(self, artifact), fields(item_id = %item_id, new = %new))]
    async fn update_status(
        &self,
        item_id: &str,
        expected: StageStatus,
        new: StageStatus,
        artifact: Option<&ArtifactRef>,
        error: Option<ErrorKind>,
    ) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| OppsumError::Store(format!("Failed to acquire lock: {}", e)))?;

        // COALESCE keeps the previous artifact ref when the transition does
        // not produce a new one (e.g. moving into a running status).
        let changed = conn.execute(
            r#"
            UPDATE items
            SET stage_status = ?1,
                working_artifact_ref = COALESCE(?2, working_artifact_ref),
                error_kind = ?3,
                updated_at = ?4
            WHERE item_id = ?5 AND stage_status = ?6
            "#,
            params![
                new.as_str(),
                artifact.map(|r| r.as_str()),
                error.map(|k| k.as_str()),
                Utc::now().to_rfc3339(),
                item_id,
                expected.as_str(),
            ],
        )?;

        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(id: &str) -> Item {
        Item {
            item_id: id.to_string(),
            job_id: "job1".to_string(),
            title: "Sample".to_string(),
            duration_seconds: 300,
            has_captions: true,
            upload_date: "20240102".to_string(),
            stage_status: StageStatus::Discovered,
            working_artifact_ref: None,
            error_kind: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert_item(&sample_item("v1")).await.unwrap();

        let item = store.get_item("v1").await.unwrap().unwrap();
        assert_eq!(item.title, "Sample");
        assert!(item.has_captions);
        assert_eq!(item.stage_status, StageStatus::Discovered);

        assert!(store.get_item("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_optimistic_update_succeeds_from_expected() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert_item(&sample_item("v1")).await.unwrap();

        let artifact = ArtifactRef::new("videos/v1.mp4");
        let ok = store
            .update_status(
                "v1",
                StageStatus::Discovered,
                StageStatus::Downloading,
                Some(&artifact),
                None,
            )
            .await
            .unwrap();
        assert!(ok);

        let item = store.get_item("v1").await.unwrap().unwrap();
        assert_eq!(item.stage_status, StageStatus::Downloading);
        assert_eq!(item.working_artifact_ref, Some(artifact));
    }

    #[tokio::test]
    async fn test_stale_update_is_dropped() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert_item(&sample_item("v1")).await.unwrap();

        store
            .update_status(
                "v1",
                StageStatus::Discovered,
                StageStatus::Downloading,
                None,
                None,
            )
            .await
            .unwrap();

        // A worker still holding the old status must not win.
        let stale = store
            .update_status(
                "v1",
                StageStatus::Discovered,
                StageStatus::Failed,
                None,
                Some(ErrorKind::BackendCall),
            )
            .await
            .unwrap();
        assert!(!stale);

        let item = store.get_item("v1").await.unwrap().unwrap();
        assert_eq!(item.stage_status, StageStatus::Downloading);
        assert!(item.error_kind.is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_artifact_when_none_given() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert_item(&sample_item("v1")).await.unwrap();

        let artifact = ArtifactRef::new("videos/v1.mp4");
        store
            .update_status(
                "v1",
                StageStatus::Discovered,
                StageStatus::Downloaded,
                Some(&artifact),
                None,
            )
            .await
            .unwrap();
        store
            .update_status(
                "v1",
                StageStatus::Downloaded,
                StageStatus::ExtractingAudio,
                None,
                None,
            )
            .await
            .unwrap();

        let item = store.get_item("v1").await.unwrap().unwrap();
        assert_eq!(item.working_artifact_ref, Some(artifact));
    }

    #[tokio::test]
    async fn test_list_items_by_job() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert_item(&sample_item("v1")).await.unwrap();
        let mut other = sample_item("v2");
        other.job_id = "job2".to_string();
        store.upsert_item(&other).await.unwrap();

        assert_eq!(store.list_items(None).await.unwrap().len(), 2);
        let job1 = store.list_items(Some("job1")).await.unwrap();
        assert_eq!(job1.len(), 1);
        assert_eq!(job1[0].item_id, "v1");
    }
}
