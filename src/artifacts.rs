//! Artifact store adapter.
//!
//! Maps a logical item identity to deterministic file locations and reports
//! artifact existence without producing anything. The existence check is what
//! makes every stage handler resumable: a stage whose output is already on
//! disk is a no-op.

use crate::error::{OppsumError, Result};
use crate::model::{ArtifactRef, Item};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum length of the sanitized title component in a filename.
const MAX_FILENAME_LENGTH: usize = 100;

/// The durable output types a stage can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Audio,
    Transcript,
    Summary,
}

impl ArtifactKind {
    /// Subdirectory under the artifact root for this kind.
    pub fn dir(self) -> &'static str {
        match self {
            ArtifactKind::Video => "videos",
            ArtifactKind::Audio => "audios",
            ArtifactKind::Transcript => "transcriptions",
            ArtifactKind::Summary => "summaries",
        }
    }

    /// File extension for this kind.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Video => "mp4",
            ArtifactKind::Audio => "wav",
            ArtifactKind::Transcript => "txt",
            ArtifactKind::Summary => "txt",
        }
    }
}

/// Adapter over durable artifact storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Deterministic reference for an item's artifact of the given kind.
    fn resolve(&self, item: &Item, kind: ArtifactKind) -> ArtifactRef;

    /// Whether the artifact exists.
    async fn exists(&self, artifact: &ArtifactRef) -> Result<bool>;

    /// Read a text artifact.
    async fn read_text(&self, artifact: &ArtifactRef) -> Result<String>;

    /// Write a text artifact, creating parent directories as needed.
    async fn write_text(&self, artifact: &ArtifactRef, text: &str) -> Result<()>;

    /// Absolute filesystem path for tool invocations that read or write files.
    fn absolute_path(&self, artifact: &ArtifactRef) -> PathBuf;
}

/// Filesystem-backed artifact store.
///
/// References are paths relative to `root`, in the form
/// `<kind-dir>/<sanitized-title>-<upload-date>-<item-id>.<ext>`.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Strip characters that are invalid in filenames and cap the length.
    fn sanitize_title(title: &str) -> String {
        let sanitized: String = title
            .chars()
            .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
            .collect();
        sanitized.chars().take(MAX_FILENAME_LENGTH).collect()
    }

    fn base_filename(item: &Item) -> String {
        format!(
            "{}-{}-{}",
            Self::sanitize_title(&item.title),
            item.upload_date,
            item.item_id
        )
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn resolve(&self, item: &Item, kind: ArtifactKind) -> ArtifactRef {
        ArtifactRef::new(format!(
            "{}/{}.{}",
            kind.dir(),
            Self::base_filename(item),
            kind.extension()
        ))
    }

    async fn exists(&self, artifact: &ArtifactRef) -> Result<bool> {
        Ok(self.absolute_path(artifact).exists())
    }

    async fn read_text(&self, artifact: &ArtifactRef) -> Result<String> {
        let path = self.absolute_path(artifact);
        if !path.exists() {
            return Err(OppsumError::InputNotFound(artifact.to_string()));
        }
        Ok(tokio::fs::read_to_string(&path).await?)
    }

    async fn write_text(&self, artifact: &ArtifactRef, text: &str) -> Result<()> {
        let path = self.absolute_path(artifact);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, text).await?;
        debug!("Wrote artifact {}", artifact);
        Ok(())
    }

    fn absolute_path(&self, artifact: &ArtifactRef) -> PathBuf {
        self.root.join(Path::new(artifact.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StageStatus;
    use chrono::Utc;

    fn item(title: &str) -> Item {
        Item {
            item_id: "abc123".to_string(),
            job_id: "job1".to_string(),
            title: title.to_string(),
            duration_seconds: 60,
            has_captions: false,
            upload_date: "20240115".to_string(),
            stage_status: StageStatus::Discovered,
            working_artifact_ref: None,
            error_kind: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let store = FsArtifactStore::new("/data");
        let a = store.resolve(&item("My Video"), ArtifactKind::Audio);
        let b = store.resolve(&item("My Video"), ArtifactKind::Audio);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "audios/My Video-20240115-abc123.wav");
    }

    #[test]
    fn test_sanitize_strips_invalid_characters() {
        let store = FsArtifactStore::new("/data");
        let r = store.resolve(&item("a/b:c*d?e\"f<g>h|i"), ArtifactKind::Summary);
        assert_eq!(r.as_str(), "summaries/abcdefghi-20240115-abc123.txt");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long_title = "x".repeat(500);
        let store = FsArtifactStore::new("/data");
        let r = store.resolve(&item(&long_title), ArtifactKind::Video);
        let filename = r.as_str().rsplit('/').next().unwrap();
        // title (100) + "-20240115-abc123.mp4"
        assert_eq!(filename.len(), 100 + 20);
    }

    #[tokio::test]
    async fn test_write_read_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let artifact = store.resolve(&item("t"), ArtifactKind::Transcript);

        assert!(!store.exists(&artifact).await.unwrap());
        store.write_text(&artifact, "hello world").await.unwrap();
        assert!(store.exists(&artifact).await.unwrap());
        assert_eq!(store.read_text(&artifact).await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_read_missing_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let artifact = ArtifactRef::new("transcriptions/missing.txt");
        match store.read_text(&artifact).await {
            Err(OppsumError::InputNotFound(_)) => {}
            other => panic!("Expected InputNotFound, got {:?}", other),
        }
    }
}
