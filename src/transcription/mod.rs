//! Speech-to-text transcription.
//!
//! The chunked driver splits long audio into bounded time segments,
//! transcribes each independently, and reassembles the text in segment
//! order. A failed segment becomes an explicit placeholder rather than a
//! silent gap, so downstream stages know content was lost at that point.

mod chunked;
mod whisper;

pub use chunked::ChunkedTranscriber;
pub use whisper::WhisperBackend;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Marker inserted where a segment could not be transcribed.
pub const SEGMENT_FAILURE_PLACEHOLDER: &str = "[transcription failed]";

/// Whether any segment failed during transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    Complete,
    Partial,
}

/// Assembled transcript text.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub text: String,
    pub kind: TranscriptKind,
    /// Number of segments that failed and were replaced by placeholders.
    pub failed_segments: usize,
    /// Per-segment results in time order.
    pub segments: Vec<Segment>,
}

/// One time-bounded slice of audio, after transcription.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub start_offset: f64,
    pub end_offset: f64,
    /// Transcribed text, or None when the segment call failed.
    pub text: Option<String>,
}

/// Backend that transcribes a single audio segment.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn transcribe_segment(&self, audio: &Path) -> Result<String>;
}

/// Transcribes a whole audio file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<TranscriptionResult>;
}
