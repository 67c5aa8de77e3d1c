//! Oppsum - Video Catalog Summarizer
//!
//! A pipeline that discovers videos from a channel, downloads them, extracts
//! and transcribes the audio, and produces an AI summary of every video.
//!
//! The name "Oppsum" comes from the Norwegian "oppsummering," a summary.
//!
//! # Overview
//!
//! Oppsum allows you to:
//! - Discover and track every video of a channel
//! - Transcribe videos with Whisper, or reuse their caption tracks
//! - Summarize arbitrarily long transcripts under a fixed token budget
//! - Resume interrupted work without repeating completed stages
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `model` - Shared pipeline data contracts
//! - `artifacts` - Durable stage outputs on the filesystem
//! - `store` - Persisted item records (SQLite)
//! - `bus` - Command queues and event fan-out
//! - `media` - yt-dlp and ffmpeg tool adapters
//! - `transcription` - Chunked speech-to-text
//! - `summarization` - Recursive transcript reduction
//! - `orchestrator` - Stage coordination and workers
//!
//! # Example
//!
//! ```rust,no_run
//! use oppsum::config::Settings;
//! use oppsum::model::{Command, CommandPayload};
//! use oppsum::orchestrator::{build_pipeline, run_workers};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let (bus, orchestrator) = build_pipeline(&settings)?;
//!
//!     // Discover a channel, then let the workers drive every item.
//!     orchestrator
//!         .handle(Command::new(
//!             "job-1",
//!             "job-1",
//!             CommandPayload::Discover {
//!                 channel_url: "https://www.youtube.com/@example".to_string(),
//!                 max_videos: Some(5),
//!             },
//!         ))
//!         .await?;
//!     run_workers(bus, orchestrator);
//!
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod model;
pub mod openai;
pub mod orchestrator;
pub mod store;
pub mod summarization;
pub mod transcription;

pub use error::{OppsumError, Result};
