//! yt-dlp backed metadata fetching and downloading.

use super::{Downloader, ItemMetadata, MetadataFetcher};
use crate::error::{OppsumError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Metadata fetcher backed by `yt-dlp --dump-json`.
pub struct YtDlpFetcher {
    video_id_regex: Regex,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        // Matches watch/short URLs and bare 11-character video ids
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self { video_id_regex }
    }

    fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    fn metadata_from_json(&self, json: &serde_json::Value) -> Option<ItemMetadata> {
        let raw_id = json["id"].as_str().or_else(|| json["url"].as_str())?;
        let video_id = self
            .extract_video_id(raw_id)
            .unwrap_or_else(|| raw_id.to_string());

        // yt-dlp reports subtitles as maps keyed by language; either manual
        // or automatic captions count.
        let has_captions = json["subtitles"]
            .as_object()
            .map(|m| !m.is_empty())
            .unwrap_or(false)
            || json["automatic_captions"]
                .as_object()
                .map(|m| !m.is_empty())
                .unwrap_or(false);

        Some(ItemMetadata {
            video_id: video_id.clone(),
            title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
            duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u32,
            has_captions,
            upload_date: json["upload_date"].as_str().unwrap_or("unknown").to_string(),
            video_url: format!("https://www.youtube.com/watch?v={}", video_id),
        })
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataFetcher for YtDlpFetcher {
    #[instrument(skip(self))]
    async fn fetch_details(&self, url: &str) -> Result<ItemMetadata> {
        let output = run_ytdlp(&["--dump-json", "--no-download", "--no-warnings", url]).await?;

        let json: serde_json::Value = serde_json::from_str(&output)
            .map_err(|e| OppsumError::Discovery(format!("Failed to parse yt-dlp output: {}", e)))?;

        self.metadata_from_json(&json)
            .ok_or_else(|| OppsumError::Discovery(format!("No video id in metadata for {}", url)))
    }

    #[instrument(skip(self))]
    async fn list_channel(
        &self,
        channel_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ItemMetadata>> {
        let limit_str = limit.unwrap_or(50).to_string();

        // Flat listing first, then full details per video; the flat entries
        // carry no caption or upload date information.
        let listing = run_ytdlp(&[
            "--dump-json",
            "--no-download",
            "--no-warnings",
            "--flat-playlist",
            "--playlist-end",
            &limit_str,
            channel_url,
        ])
        .await?;

        let mut items = Vec::new();
        for line in listing.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let json: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    debug!("Skipping unparseable playlist entry: {}", e);
                    continue;
                }
            };
            if let Some(flat) = self.metadata_from_json(&json) {
                match self.fetch_details(&flat.video_url).await {
                    Ok(full) => items.push(full),
                    Err(e) => {
                        // One unavailable video must not sink the job
                        debug!("Skipping {}: {}", flat.video_id, e);
                    }
                }
            }
        }

        info!("Listed {} videos from {}", items.len(), channel_url);
        Ok(items)
    }
}

/// Downloader backed by yt-dlp.
pub struct YtDlpDownloader;

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    #[instrument(skip(self, dest))]
    async fn download_video(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Downloading video from {}", url);

        let dest_str = dest
            .to_str()
            .ok_or_else(|| OppsumError::Download("Non-UTF8 destination path".to_string()))?;

        run_ytdlp(&[
            "--format",
            "mp4/bestvideo+bestaudio",
            "--merge-output-format",
            "mp4",
            "--output",
            dest_str,
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            url,
        ])
        .await?;

        if !dest.exists() {
            return Err(OppsumError::Download(
                "Video file not found after download".to_string(),
            ));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_captions(&self, url: &str) -> Result<String> {
        let temp_dir = tempfile::tempdir()?;
        let template = temp_dir.path().join("captions.%(ext)s");
        let template_str = template
            .to_str()
            .ok_or_else(|| OppsumError::Download("Non-UTF8 temp path".to_string()))?;

        run_ytdlp(&[
            "--skip-download",
            "--write-subs",
            "--write-auto-subs",
            "--sub-langs",
            "en.*",
            "--sub-format",
            "vtt",
            "--output",
            template_str,
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            url,
        ])
        .await?;

        // yt-dlp names the file captions.<lang>.vtt; take the first vtt found
        let entries = std::fs::read_dir(temp_dir.path())?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("vtt") {
                let raw = tokio::fs::read_to_string(&path).await?;
                return Ok(raw);
            }
        }

        Err(OppsumError::Download(format!(
            "No caption track available for {}",
            url
        )))
    }
}

/// Run yt-dlp with the given args and return stdout.
async fn run_ytdlp(args: &[&str]) -> Result<String> {
    let result = Command::new("yt-dlp")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OppsumError::ToolNotFound("yt-dlp".into()));
        }
        Err(e) => {
            return Err(OppsumError::ToolFailed(format!("yt-dlp execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OppsumError::ToolFailed(format!("yt-dlp failed: {stderr}")));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let fetcher = YtDlpFetcher::new();

        assert_eq!(
            fetcher.extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            fetcher.extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            fetcher.extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(fetcher.extract_video_id("not a video"), None);
    }

    #[test]
    fn test_metadata_from_json_reads_captions_flag() {
        let fetcher = YtDlpFetcher::new();

        let with_subs: serde_json::Value = serde_json::json!({
            "id": "dQw4w9WgXcQ",
            "title": "A Video",
            "duration": 212.0,
            "upload_date": "20091025",
            "subtitles": {"en": []},
        });
        let meta = fetcher.metadata_from_json(&with_subs).unwrap();
        assert!(meta.has_captions);
        assert_eq!(meta.duration_seconds, 212);
        assert_eq!(meta.upload_date, "20091025");

        let without: serde_json::Value = serde_json::json!({
            "id": "dQw4w9WgXcQ",
            "title": "A Video",
            "subtitles": {},
        });
        let meta = fetcher.metadata_from_json(&without).unwrap();
        assert!(!meta.has_captions);
    }

    #[test]
    fn test_metadata_from_json_requires_id() {
        let fetcher = YtDlpFetcher::new();
        let json = serde_json::json!({"title": "No id"});
        assert!(fetcher.metadata_from_json(&json).is_none());
    }
}
