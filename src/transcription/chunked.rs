//! Chunked transcription driver.

use super::{
    Segment, SpeechBackend, Transcriber, TranscriptKind, TranscriptionResult,
    SEGMENT_FAILURE_PLACEHOLDER,
};
use crate::error::{OppsumError, Result};
use crate::media::split_audio;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Drives transcription of a long audio file segment by segment.
///
/// Per-segment failures never abort the whole operation; a partial transcript
/// still carries summarization value and is always forwarded downstream.
pub struct ChunkedTranscriber {
    backend: Arc<dyn SpeechBackend>,
    segment_seconds: u32,
    max_concurrent: usize,
    call_timeout: Duration,
}

impl ChunkedTranscriber {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        segment_seconds: u32,
        max_concurrent: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            segment_seconds,
            max_concurrent: max_concurrent.max(1),
            call_timeout,
        }
    }

    /// Transcribe pre-split segments given as `(path, offset_seconds,
    /// length_seconds)` triples.
    pub async fn transcribe_pieces(
        &self,
        pieces: Vec<(PathBuf, f64, f64)>,
    ) -> Result<TranscriptionResult> {
        if pieces.is_empty() {
            return Err(OppsumError::Transcription("No audio segments".to_string()));
        }

        let mut segments: Vec<Segment> = stream::iter(pieces.into_iter().enumerate())
            .map(|(index, (path, offset, length))| async move {
                let call = self.backend.transcribe_segment(&path);
                let text = match timeout(self.call_timeout, call).await {
                    Ok(Ok(text)) => Some(text),
                    Ok(Err(e)) => {
                        warn!("Segment {} failed: {}", index, e);
                        None
                    }
                    Err(_) => {
                        warn!("Segment {} timed out", index);
                        None
                    }
                };
                Segment {
                    index,
                    start_offset: offset,
                    end_offset: offset + length,
                    text,
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        // Reassembly is strictly by index; buffer_unordered gives no order.
        segments.sort_by_key(|s| s.index);

        let failed_segments = segments.iter().filter(|s| s.text.is_none()).count();

        let text = segments
            .iter()
            .map(|s| match &s.text {
                Some(t) => t.trim(),
                None => SEGMENT_FAILURE_PLACEHOLDER,
            })
            .collect::<Vec<_>>()
            .join(" ");

        let kind = if failed_segments > 0 {
            warn!(
                "{} of {} segments failed; forwarding partial transcript",
                failed_segments,
                segments.len()
            );
            TranscriptKind::Partial
        } else {
            TranscriptKind::Complete
        };

        Ok(TranscriptionResult {
            text,
            kind,
            failed_segments,
            segments,
        })
    }
}

#[async_trait]
impl Transcriber for ChunkedTranscriber {
    /// Transcribe an audio file, splitting it into bounded segments first.
    #[instrument(skip(self), fields(audio = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult> {
        let temp_dir = tempfile::tempdir()?;
        let pieces = split_audio(audio_path, temp_dir.path(), self.segment_seconds).await?;

        info!("Transcribing {} audio segments", pieces.len());
        let result = self.transcribe_pieces(pieces).await;
        drop(temp_dir);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Backend whose responses are keyed by segment file name.
    struct ScriptedBackend {
        responses: HashMap<String, std::result::Result<String, String>>,
    }

    #[async_trait]
    impl SpeechBackend for ScriptedBackend {
        async fn transcribe_segment(&self, audio: &Path) -> Result<String> {
            let name = audio.file_name().unwrap().to_str().unwrap();
            match self.responses.get(name) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(msg)) => Err(OppsumError::Transcription(msg.clone())),
                None => panic!("Unexpected segment {}", name),
            }
        }
    }

    /// Backend that never responds within the timeout.
    struct HangingBackend;

    #[async_trait]
    impl SpeechBackend for HangingBackend {
        async fn transcribe_segment(&self, _audio: &Path) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    fn pieces(n: usize) -> Vec<(PathBuf, f64, f64)> {
        (0..n)
            .map(|i| {
                (
                    PathBuf::from(format!("seg_{:04}.wav", i)),
                    i as f64 * 10.0,
                    10.0,
                )
            })
            .collect()
    }

    fn scripted(specs: &[(usize, std::result::Result<&str, &str>)]) -> ScriptedBackend {
        let responses = specs
            .iter()
            .map(|(i, r)| {
                (
                    format!("seg_{:04}.wav", i),
                    r.map(str::to_string).map_err(str::to_string),
                )
            })
            .collect();
        ScriptedBackend { responses }
    }

    fn transcriber(backend: Arc<dyn SpeechBackend>) -> ChunkedTranscriber {
        ChunkedTranscriber::new(backend, 10, 2, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_all_segments_succeed() {
        let backend = scripted(&[(0, Ok("one")), (1, Ok("two")), (2, Ok("three"))]);
        let t = transcriber(Arc::new(backend));

        let result = t.transcribe_pieces(pieces(3)).await.unwrap();
        assert_eq!(result.kind, TranscriptKind::Complete);
        assert_eq!(result.failed_segments, 0);
        assert_eq!(result.text, "one two three");
    }

    #[tokio::test]
    async fn test_failed_segment_becomes_placeholder_in_position() {
        // Segment 3 of 5 (index 2) fails
        let backend = scripted(&[
            (0, Ok("alpha")),
            (1, Ok("bravo")),
            (2, Err("backend down")),
            (3, Ok("delta")),
            (4, Ok("echo")),
        ]);
        let t = transcriber(Arc::new(backend));

        let result = t.transcribe_pieces(pieces(5)).await.unwrap();
        assert_eq!(result.kind, TranscriptKind::Partial);
        assert_eq!(result.failed_segments, 1);
        assert_eq!(
            result.text,
            format!("alpha bravo {} delta echo", SEGMENT_FAILURE_PLACEHOLDER)
        );
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_segment_failure() {
        let t = transcriber(Arc::new(HangingBackend));

        let result = t.transcribe_pieces(pieces(2)).await.unwrap();
        assert_eq!(result.kind, TranscriptKind::Partial);
        assert_eq!(result.failed_segments, 2);
        assert_eq!(
            result.text,
            format!(
                "{} {}",
                SEGMENT_FAILURE_PLACEHOLDER, SEGMENT_FAILURE_PLACEHOLDER
            )
        );
    }

    #[tokio::test]
    async fn test_final_short_segment_keeps_its_real_bounds() {
        let backend = scripted(&[(0, Ok("start")), (1, Ok("end"))]);
        let t = transcriber(Arc::new(backend));

        let result = t
            .transcribe_pieces(vec![
                (PathBuf::from("seg_0000.wav"), 0.0, 10.0),
                (PathBuf::from("seg_0001.wav"), 10.0, 4.5),
            ])
            .await
            .unwrap();

        assert_eq!(result.segments[0].end_offset, 10.0);
        assert_eq!(result.segments[1].start_offset, 10.0);
        assert_eq!(result.segments[1].end_offset, 14.5);
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let backend = scripted(&[]);
        let t = transcriber(Arc::new(backend));
        assert!(t.transcribe_pieces(vec![]).await.is_err());
    }
}
