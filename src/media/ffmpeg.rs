//! ffmpeg-backed audio extraction and segmentation.

use super::AudioExtractor;
use crate::error::{OppsumError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Extracts the audio track from a video as 16 kHz mono WAV, the format the
/// speech backend expects.
pub struct FfmpegExtractor;

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    #[instrument(skip(self), fields(video = %video.display()))]
    async fn extract(&self, video: &Path, audio: &Path) -> Result<()> {
        if !video.exists() {
            return Err(OppsumError::InputNotFound(video.display().to_string()));
        }
        if let Some(parent) = audio.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Extracting audio to {:?}", audio);

        let result = Command::new("ffmpeg")
            .arg("-i").arg(video)
            .arg("-vn")
            .arg("-acodec").arg("pcm_s16le")
            .arg("-ar").arg("16000")
            .arg("-ac").arg("1")
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg(audio)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(OppsumError::AudioExtraction(format!("ffmpeg failed: {err}")))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OppsumError::ToolNotFound("ffmpeg".into()))
            }
            Err(e) => Err(OppsumError::AudioExtraction(format!("ffmpeg error: {e}"))),
        }
    }
}

/// Split an audio file into fixed-length segments.
///
/// Returns `(segment_path, offset_seconds, length_seconds)` triples in time
/// order; the last segment may be shorter. Audio at or under one segment
/// length is returned as-is without re-encoding.
#[instrument(skip_all)]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    segment_seconds: u32,
) -> Result<Vec<(PathBuf, f64, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let total_duration = probe_duration(source).await?;
    debug!("Total audio duration: {:.1}s", total_duration);

    let segment_len = segment_seconds as f64;

    if total_duration <= segment_len {
        return Ok(vec![(source.to_path_buf(), 0.0, total_duration)]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut segments = Vec::new();
    let mut offset = 0.0;
    let mut idx = 0u32;

    while offset < total_duration {
        let segment_path = output_dir.join(format!("{}_{:04}.wav", base_name, idx));
        let length = segment_len.min(total_duration - offset);

        cut_segment(source, &segment_path, offset, length).await?;

        segments.push((segment_path, offset, length));
        offset += segment_len;
        idx += 1;
    }

    info!("Split audio into {} segments", segments.len());
    Ok(segments)
}

/// Cut one time range out of an audio file.
async fn cut_segment(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    // Stream copy first; fall back to re-encoding when the container
    // does not allow clean cuts at arbitrary offsets.
    let copy_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("warning")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Ok(status) = copy_result {
        if status.success() && dest.exists() {
            return Ok(());
        }
    }

    warn!("Stream copy failed, re-encoding segment");

    let encode_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-acodec").arg("pcm_s16le")
        .arg("-ar").arg("16000")
        .arg("-ac").arg("1")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match encode_result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(OppsumError::AudioExtraction(format!(
                "Segment cut failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OppsumError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(OppsumError::AudioExtraction(format!("ffmpeg error: {e}"))),
    }
}

/// Query the duration of an audio file using ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OppsumError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(OppsumError::AudioExtraction(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(OppsumError::AudioExtraction("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| OppsumError::AudioExtraction("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| OppsumError::AudioExtraction("Could not determine audio duration".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_missing_video_is_input_not_found() {
        let extractor = FfmpegExtractor::new();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let audio = dir.path().join("out.wav");

        match extractor.extract(&missing, &audio).await {
            Err(OppsumError::InputNotFound(_)) => {}
            other => panic!("Expected InputNotFound, got {:?}", other),
        }
    }
}
