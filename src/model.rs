//! Shared data contracts for the pipeline.
//!
//! These types cross every boundary in the system: the command queue, the
//! event bus, and the persisted item record all speak in terms of this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Download,
    AudioExtraction,
    Transcription,
    Summarization,
}

impl Stage {
    /// All stages, in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Discovery,
        Stage::Download,
        Stage::AudioExtraction,
        Stage::Transcription,
        Stage::Summarization,
    ];

    /// The stage that follows this one in the default (no-captions) path.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Discovery => Some(Stage::Download),
            Stage::Download => Some(Stage::AudioExtraction),
            Stage::AudioExtraction => Some(Stage::Transcription),
            Stage::Transcription => Some(Stage::Summarization),
            Stage::Summarization => None,
        }
    }

    /// Status an item carries while this stage is running.
    pub fn running_status(self) -> StageStatus {
        match self {
            Stage::Discovery => StageStatus::Pending,
            Stage::Download => StageStatus::Downloading,
            Stage::AudioExtraction => StageStatus::ExtractingAudio,
            Stage::Transcription => StageStatus::Transcribing,
            Stage::Summarization => StageStatus::Summarizing,
        }
    }

    /// Status an item carries once this stage has completed.
    pub fn done_status(self) -> StageStatus {
        match self {
            Stage::Discovery => StageStatus::Discovered,
            Stage::Download => StageStatus::Downloaded,
            Stage::AudioExtraction => StageStatus::AudioExtracted,
            Stage::Transcription => StageStatus::Transcribed,
            Stage::Summarization => StageStatus::Summarized,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Discovery => "discovery",
            Stage::Download => "download",
            Stage::AudioExtraction => "audio_extraction",
            Stage::Transcription => "transcription",
            Stage::Summarization => "summarization",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(Stage::Discovery),
            "download" => Ok(Stage::Download),
            "audio_extraction" => Ok(Stage::AudioExtraction),
            "transcription" => Ok(Stage::Transcription),
            "summarization" => Ok(Stage::Summarization),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// Processing status of an item.
///
/// Transitions are monotonic forward, except that a retried stage re-enters
/// its own in-progress status. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    Discovered,
    Downloading,
    Downloaded,
    ExtractingAudio,
    AudioExtracted,
    Transcribing,
    Transcribed,
    Summarizing,
    Summarized,
    Failed,
}

impl StageStatus {
    /// Position in the forward progression. `Failed` sits outside it.
    pub fn rank(self) -> u8 {
        match self {
            StageStatus::Pending => 0,
            StageStatus::Discovered => 1,
            StageStatus::Downloading => 2,
            StageStatus::Downloaded => 3,
            StageStatus::ExtractingAudio => 4,
            StageStatus::AudioExtracted => 5,
            StageStatus::Transcribing => 6,
            StageStatus::Transcribed => 7,
            StageStatus::Summarizing => 8,
            StageStatus::Summarized => 9,
            StageStatus::Failed => u8::MAX,
        }
    }

    /// Whether no further stage will process this item.
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Summarized | StageStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "PENDING",
            StageStatus::Discovered => "DISCOVERED",
            StageStatus::Downloading => "DOWNLOADING",
            StageStatus::Downloaded => "DOWNLOADED",
            StageStatus::ExtractingAudio => "EXTRACTING_AUDIO",
            StageStatus::AudioExtracted => "AUDIO_EXTRACTED",
            StageStatus::Transcribing => "TRANSCRIBING",
            StageStatus::Transcribed => "TRANSCRIBED",
            StageStatus::Summarizing => "SUMMARIZING",
            StageStatus::Summarized => "SUMMARIZED",
            StageStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(StageStatus::Pending),
            "DISCOVERED" => Ok(StageStatus::Discovered),
            "DOWNLOADING" => Ok(StageStatus::Downloading),
            "DOWNLOADED" => Ok(StageStatus::Downloaded),
            "EXTRACTING_AUDIO" => Ok(StageStatus::ExtractingAudio),
            "AUDIO_EXTRACTED" => Ok(StageStatus::AudioExtracted),
            "TRANSCRIBING" => Ok(StageStatus::Transcribing),
            "TRANSCRIBED" => Ok(StageStatus::Transcribed),
            "SUMMARIZING" => Ok(StageStatus::Summarizing),
            "SUMMARIZED" => Ok(StageStatus::Summarized),
            "FAILED" => Ok(StageStatus::Failed),
            _ => Err(format!("Unknown stage status: {}", s)),
        }
    }
}

/// Failure taxonomy carried on items and failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or backend timeout. Retried by bus redelivery, not by the core.
    TransientIo,
    /// A required prior artifact is missing. Fatal for the item.
    InputNotFound,
    /// Malformed command or payload. Fatal for the item.
    Validation,
    /// A transcription or summarization call failed after its timeout,
    /// with no fallback left to absorb it.
    BackendCall,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::InputNotFound => "input_not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::BackendCall => "backend_call",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "transient_io" => Ok(ErrorKind::TransientIo),
            "input_not_found" => Ok(ErrorKind::InputNotFound),
            "validation" => Ok(ErrorKind::Validation),
            "backend_call" => Ok(ErrorKind::BackendCall),
            _ => Err(format!("Unknown error kind: {}", s)),
        }
    }
}

/// Opaque pointer to a stage's durable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One video under processing. Created at Discovery, mutated at every stage,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Stable external identifier (the video id).
    pub item_id: String,
    /// Groups items from one discovery request.
    pub job_id: String,
    pub title: String,
    pub duration_seconds: u32,
    pub has_captions: bool,
    /// Upload date in YYYYMMDD form, as reported by the source.
    pub upload_date: String,
    pub stage_status: StageStatus,
    /// Most recently produced artifact.
    pub working_artifact_ref: Option<ArtifactRef>,
    pub error_kind: Option<ErrorKind>,
    pub updated_at: DateTime<Utc>,
}

/// Stage-specific command payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandPayload {
    Discover {
        channel_url: String,
        max_videos: Option<usize>,
    },
    Download {
        video_url: String,
    },
    ExtractAudio {
        video_ref: ArtifactRef,
    },
    Transcribe {
        audio_ref: ArtifactRef,
    },
    Summarize {
        transcript_ref: ArtifactRef,
    },
}

impl CommandPayload {
    /// The stage this payload belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            CommandPayload::Discover { .. } => Stage::Discovery,
            CommandPayload::Download { .. } => Stage::Download,
            CommandPayload::ExtractAudio { .. } => Stage::AudioExtraction,
            CommandPayload::Transcribe { .. } => Stage::Transcription,
            CommandPayload::Summarize { .. } => Stage::Summarization,
        }
    }
}

/// A unit of work for one stage. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub item_id: String,
    pub job_id: String,
    pub stage: Stage,
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(item_id: impl Into<String>, job_id: impl Into<String>, payload: CommandPayload) -> Self {
        let stage = payload.stage();
        Self {
            item_id: item_id.into(),
            job_id: job_id.into(),
            stage,
            payload,
        }
    }
}

/// Outcome of a stage for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Fan-out notification that a stage finished for one item.
///
/// Delivery is at-least-once; consumers must tolerate duplicates keyed by
/// `item_id` + `stage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub item_id: String,
    pub job_id: String,
    pub stage: Stage,
    pub outcome: Outcome,
    pub produced_artifact_ref: Option<ArtifactRef>,
    pub error_kind: Option<ErrorKind>,
    pub completed_at: DateTime<Utc>,
}

impl Event {
    pub fn success(item: &str, job: &str, stage: Stage, artifact: Option<ArtifactRef>) -> Self {
        Self {
            item_id: item.to_string(),
            job_id: job.to_string(),
            stage,
            outcome: Outcome::Success,
            produced_artifact_ref: artifact,
            error_kind: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(item: &str, job: &str, stage: Stage, kind: ErrorKind) -> Self {
        Self {
            item_id: item.to_string(),
            job_id: job.to_string(),
            stage,
            outcome: Outcome::Failure,
            produced_artifact_ref: None,
            error_kind: Some(kind),
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Discovery;
        let mut walked = vec![stage];
        while let Some(next) = stage.next() {
            walked.push(next);
            stage = next;
        }
        assert_eq!(walked, Stage::ALL);
    }

    #[test]
    fn test_status_ranks_are_monotonic() {
        let forward = [
            StageStatus::Pending,
            StageStatus::Discovered,
            StageStatus::Downloading,
            StageStatus::Downloaded,
            StageStatus::ExtractingAudio,
            StageStatus::AudioExtracted,
            StageStatus::Transcribing,
            StageStatus::Transcribed,
            StageStatus::Summarizing,
            StageStatus::Summarized,
        ];
        for pair in forward.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            StageStatus::Pending,
            StageStatus::ExtractingAudio,
            StageStatus::Summarized,
            StageStatus::Failed,
        ] {
            let parsed: StageStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_running_and_done_statuses_match_stage() {
        assert_eq!(Stage::Download.running_status(), StageStatus::Downloading);
        assert_eq!(Stage::Download.done_status(), StageStatus::Downloaded);
        assert_eq!(
            Stage::Summarization.done_status(),
            StageStatus::Summarized
        );
    }

    #[test]
    fn test_command_serializes_with_tagged_payload() {
        let cmd = Command::new(
            "vid1",
            "job1",
            CommandPayload::Transcribe {
                audio_ref: ArtifactRef::new("audios/vid1.wav"),
            },
        );
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"stage\":\"transcription\""));
        assert!(json.contains("\"kind\":\"transcribe\""));

        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage, Stage::Transcription);
    }

    #[test]
    fn test_event_constructors() {
        let ok = Event::success("v", "j", Stage::Download, Some(ArtifactRef::new("a")));
        assert_eq!(ok.outcome, Outcome::Success);
        assert!(ok.error_kind.is_none());

        let bad = Event::failure("v", "j", Stage::Download, ErrorKind::BackendCall);
        assert_eq!(bad.outcome, Outcome::Failure);
        assert!(bad.produced_artifact_ref.is_none());
    }
}
