//! Persisted item records.
//!
//! The item record is the single source of truth for where a video sits in
//! the pipeline. Status writes are single atomic updates guarded by an
//! optimistic precondition on the current status, so a stale worker cannot
//! overwrite a newer one.

mod sqlite;

pub use sqlite::SqliteItemStore;

use crate::error::Result;
use crate::model::{ArtifactRef, ErrorKind, Item, StageStatus};
use async_trait::async_trait;

/// Store for item records.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert or replace an item record.
    async fn upsert_item(&self, item: &Item) -> Result<()>;

    /// Fetch an item by id.
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>>;

    /// List items, optionally restricted to one job, newest first.
    async fn list_items(&self, job_id: Option<&str>) -> Result<Vec<Item>>;

    /// Atomically move an item from `expected` to `new` status, updating the
    /// working artifact ref and error kind alongside it.
    ///
    /// Returns false when the precondition did not hold (another worker got
    /// there first); the caller must treat that as "drop this write".
    async fn update_status(
        &self,
        item_id: &str,
        expected: StageStatus,
        new: StageStatus,
        artifact: Option<&ArtifactRef>,
        error: Option<ErrorKind>,
    ) -> Result<bool>;
}
