//! Pipeline tools backed by external media tooling (yt-dlp, ffmpeg).
//!
//! Each tool performs exactly one domain operation against validated inputs
//! and returns a typed failure on error. None of them know about queues,
//! statuses, or each other; the stage orchestrator wires them together.

mod ffmpeg;
mod youtube;

pub use ffmpeg::{probe_duration, split_audio, FfmpegExtractor};
pub use youtube::{YtDlpDownloader, YtDlpFetcher};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Metadata for one discovered video.
#[derive(Debug, Clone)]
pub struct ItemMetadata {
    pub video_id: String,
    pub title: String,
    pub duration_seconds: u32,
    pub has_captions: bool,
    /// Upload date in YYYYMMDD form.
    pub upload_date: String,
    pub video_url: String,
}

/// Fetches video metadata from the source platform.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch full details for a single video.
    async fn fetch_details(&self, url: &str) -> Result<ItemMetadata>;

    /// List a channel's videos, newest first, up to `limit`.
    async fn list_channel(&self, channel_url: &str, limit: Option<usize>)
        -> Result<Vec<ItemMetadata>>;
}

/// Downloads video files and caption tracks.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download the video itself to `dest`.
    async fn download_video(&self, url: &str, dest: &Path) -> Result<()>;

    /// Download the caption track as raw VTT text.
    async fn download_captions(&self, url: &str) -> Result<String>;
}

/// Extracts the audio track from a downloaded video.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, video: &Path, audio: &Path) -> Result<()>;
}

/// Reduce a VTT caption file to its spoken text.
///
/// Strips the WEBVTT header, cue timings, and metadata lines; joins the
/// remaining lines with spaces, dropping consecutive duplicates (auto
/// captions repeat lines across cues).
pub fn clean_vtt(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.contains("-->")
            || trimmed.starts_with("WEBVTT")
            || trimmed.starts_with("Kind:")
            || trimmed.starts_with("Language:")
            || trimmed.starts_with("NOTE")
        {
            continue;
        }
        if lines.last() != Some(&trimmed) {
            lines.push(trimmed);
        }
    }

    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_vtt_strips_headers_and_timings() {
        let raw = "WEBVTT\nKind: captions\nLanguage: en\n\n\
            00:00:00.000 --> 00:00:02.500\nhello there\n\n\
            00:00:02.500 --> 00:00:05.000\ngeneral kenobi\n";
        assert_eq!(clean_vtt(raw), "hello there general kenobi");
    }

    #[test]
    fn test_clean_vtt_drops_repeated_lines() {
        let raw = "WEBVTT\n\n\
            00:00:00.000 --> 00:00:02.000\nso today\n\n\
            00:00:02.000 --> 00:00:04.000\nso today\n\n\
            00:00:04.000 --> 00:00:06.000\nwe will begin\n";
        assert_eq!(clean_vtt(raw), "so today we will begin");
    }

    #[test]
    fn test_clean_vtt_empty_input() {
        assert_eq!(clean_vtt("WEBVTT\n\n"), "");
    }
}
