//! Stage orchestration.
//!
//! One orchestrator serves every stage: it loads the item record, takes the
//! in-progress status transition, runs the stage's tool, persists the done
//! status together with the produced artifact, and publishes the next command
//! plus a completion event. Redelivered commands are absorbed by two guards:
//! the status rank check (the stage already completed) and the artifact
//! existence check (the output already exists, skip the tool).

mod worker;

pub use worker::run_workers;

use crate::artifacts::{ArtifactKind, ArtifactStore, FsArtifactStore};
use crate::bus::{InMemoryBus, MessageBus};
use crate::config::Settings;
use crate::error::{OppsumError, Result};
use crate::media::{
    clean_vtt, AudioExtractor, Downloader, FfmpegExtractor, ItemMetadata, MetadataFetcher,
    YtDlpDownloader, YtDlpFetcher,
};
use crate::model::{
    ArtifactRef, Command, CommandPayload, Event, Item, Stage, StageStatus,
};
use crate::store::{ItemStore, SqliteItemStore};
use crate::summarization::{OpenAiSummarizer, Reducer, ReducerConfig};
use crate::transcription::{ChunkedTranscriber, Transcriber, WhisperBackend};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Limits applied when discovering channel videos.
#[derive(Debug, Clone)]
pub struct DiscoveryLimits {
    pub max_videos: usize,
    pub max_duration_seconds: u32,
}

/// Drives every pipeline stage over shared adapters.
pub struct Orchestrator {
    store: Arc<dyn ItemStore>,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<dyn MessageBus>,
    fetcher: Arc<dyn MetadataFetcher>,
    downloader: Arc<dyn Downloader>,
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    reducer: Reducer,
    limits: DiscoveryLimits,
    tool_timeout: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ItemStore>,
        artifacts: Arc<dyn ArtifactStore>,
        bus: Arc<dyn MessageBus>,
        fetcher: Arc<dyn MetadataFetcher>,
        downloader: Arc<dyn Downloader>,
        extractor: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        reducer: Reducer,
        limits: DiscoveryLimits,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            store,
            artifacts,
            bus,
            fetcher,
            downloader,
            extractor,
            transcriber,
            reducer,
            limits,
            tool_timeout,
        }
    }

    /// Item store shared with API handlers and status commands.
    pub fn store(&self) -> Arc<dyn ItemStore> {
        self.store.clone()
    }

    /// Handle one command. Redelivered and stale commands are no-ops.
    #[instrument(skip(self, command), fields(item = %command.item_id, stage = %command.stage))]
    pub async fn handle(&self, command: Command) -> Result<()> {
        match &command.payload {
            CommandPayload::Discover {
                channel_url,
                max_videos,
            } => {
                self.discover(&command.job_id, channel_url, *max_videos)
                    .await
            }
            _ => self.handle_item_stage(command).await,
        }
    }

    /// Discovery: list the source, register unseen items, and seed the
    /// download queue. Already-known items are skipped, which makes the
    /// operation safe to repeat for the same channel.
    async fn discover(
        &self,
        job_id: &str,
        channel_url: &str,
        max_videos: Option<usize>,
    ) -> Result<()> {
        let limit = max_videos
            .unwrap_or(self.limits.max_videos)
            .min(self.limits.max_videos);

        info!("Discovering up to {} videos from {}", limit, channel_url);
        let videos = self
            .with_timeout(self.fetcher.list_channel(channel_url, Some(limit)))
            .await?;

        let mut registered = 0usize;
        for meta in videos {
            if meta.duration_seconds > self.limits.max_duration_seconds {
                debug!(
                    "[{}] Skipping, {}s exceeds duration limit",
                    meta.video_id, meta.duration_seconds
                );
                continue;
            }
            if self.store.get_item(&meta.video_id).await?.is_some() {
                debug!("[{}] Already known, skipping", meta.video_id);
                continue;
            }

            let item = item_from_metadata(&meta, job_id);
            self.store.upsert_item(&item).await?;

            self.bus
                .send_command(Command::new(
                    &meta.video_id,
                    job_id,
                    CommandPayload::Download {
                        video_url: meta.video_url.clone(),
                    },
                ))
                .await?;
            self.bus
                .publish_event(Event::success(&meta.video_id, job_id, Stage::Discovery, None))
                .await?;
            registered += 1;
        }

        info!("Registered {} new items for job {}", registered, job_id);
        Ok(())
    }

    async fn handle_item_stage(&self, command: Command) -> Result<()> {
        let stage = command.stage;
        let item = self
            .store
            .get_item(&command.item_id)
            .await?
            .ok_or_else(|| OppsumError::UnknownItem(command.item_id.clone()))?;

        // Duplicate guard: a terminal item, or one already past this stage,
        // absorbs redelivery without side effects.
        if item.stage_status == StageStatus::Failed {
            warn!("[{}] Item already failed, dropping command", item.item_id);
            return Ok(());
        }
        if item.stage_status.rank() >= stage.done_status().rank() {
            debug!(
                "[{}] Stage {} already complete (status {}), dropping command",
                item.item_id, stage, item.stage_status
            );
            return Ok(());
        }

        // Take the in-progress transition. Losing the race means another
        // worker owns this command; drop it.
        let claimed = self
            .store
            .update_status(
                &item.item_id,
                item.stage_status,
                stage.running_status(),
                None,
                None,
            )
            .await?;
        if !claimed {
            debug!("[{}] Lost status race for {}, dropping", item.item_id, stage);
            return Ok(());
        }

        match self.execute(&item, &command).await {
            Ok((artifact, next)) => {
                let committed = self
                    .store
                    .update_status(
                        &item.item_id,
                        stage.running_status(),
                        stage.done_status(),
                        Some(&artifact),
                        None,
                    )
                    .await?;
                if !committed {
                    warn!("[{}] Stale completion for {}, dropping", item.item_id, stage);
                    return Ok(());
                }

                if let Some(next_command) = next {
                    self.bus.send_command(next_command).await?;
                }
                self.bus
                    .publish_event(Event::success(
                        &item.item_id,
                        &item.job_id,
                        stage,
                        Some(artifact),
                    ))
                    .await?;
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                warn!("[{}] Stage {} failed ({}): {}", item.item_id, stage, kind, e);
                self.store
                    .update_status(
                        &item.item_id,
                        stage.running_status(),
                        StageStatus::Failed,
                        None,
                        Some(kind),
                    )
                    .await?;
                self.bus
                    .publish_event(Event::failure(&item.item_id, &item.job_id, stage, kind))
                    .await?;
                Ok(())
            }
        }
    }

    /// Run one stage's tool. Returns the produced artifact and the follow-up
    /// command, if the stage has one.
    async fn execute(
        &self,
        item: &Item,
        command: &Command,
    ) -> Result<(ArtifactRef, Option<Command>)> {
        match &command.payload {
            CommandPayload::Download { video_url } => {
                self.run_download(item, video_url).await
            }
            CommandPayload::ExtractAudio { video_ref } => {
                self.run_extract_audio(item, video_ref).await
            }
            CommandPayload::Transcribe { audio_ref } => {
                self.run_transcribe(item, audio_ref).await
            }
            CommandPayload::Summarize { transcript_ref } => {
                self.run_summarize(item, transcript_ref).await
            }
            CommandPayload::Discover { .. } => Err(OppsumError::InvalidInput(
                "Discover command routed to an item stage".to_string(),
            )),
        }
    }

    /// Download stage. Items with captions skip the audio path entirely: the
    /// caption track is cleaned into a transcript and the item jumps straight
    /// to summarization. Empty caption tracks fall back to the video path.
    async fn run_download(
        &self,
        item: &Item,
        video_url: &str,
    ) -> Result<(ArtifactRef, Option<Command>)> {
        if item.has_captions {
            let transcript_ref = self.artifacts.resolve(item, ArtifactKind::Transcript);

            if self.artifacts.exists(&transcript_ref).await? {
                debug!("[{}] Caption transcript already on disk", item.item_id);
            } else {
                let raw = self
                    .with_timeout(self.downloader.download_captions(video_url))
                    .await;
                match raw {
                    Ok(raw) => {
                        let text = clean_vtt(&raw);
                        if text.is_empty() {
                            warn!(
                                "[{}] Caption track was empty, falling back to audio path",
                                item.item_id
                            );
                            return self.download_video_file(item, video_url).await;
                        }
                        self.artifacts.write_text(&transcript_ref, &text).await?;
                    }
                    Err(e) => {
                        warn!(
                            "[{}] Caption download failed ({}), falling back to audio path",
                            item.item_id, e
                        );
                        return self.download_video_file(item, video_url).await;
                    }
                }
            }

            let next = Command::new(
                &item.item_id,
                &item.job_id,
                CommandPayload::Summarize {
                    transcript_ref: transcript_ref.clone(),
                },
            );
            return Ok((transcript_ref, Some(next)));
        }

        self.download_video_file(item, video_url).await
    }

    async fn download_video_file(
        &self,
        item: &Item,
        video_url: &str,
    ) -> Result<(ArtifactRef, Option<Command>)> {
        let video_ref = self.artifacts.resolve(item, ArtifactKind::Video);

        if self.artifacts.exists(&video_ref).await? {
            debug!("[{}] Video already on disk", item.item_id);
        } else {
            let dest = self.artifacts.absolute_path(&video_ref);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.with_timeout(self.downloader.download_video(video_url, &dest))
                .await?;
        }

        let next = Command::new(
            &item.item_id,
            &item.job_id,
            CommandPayload::ExtractAudio {
                video_ref: video_ref.clone(),
            },
        );
        Ok((video_ref, Some(next)))
    }

    async fn run_extract_audio(
        &self,
        item: &Item,
        video_ref: &ArtifactRef,
    ) -> Result<(ArtifactRef, Option<Command>)> {
        if !self.artifacts.exists(video_ref).await? {
            return Err(OppsumError::InputNotFound(video_ref.to_string()));
        }

        let audio_ref = self.artifacts.resolve(item, ArtifactKind::Audio);
        if self.artifacts.exists(&audio_ref).await? {
            debug!("[{}] Audio already on disk", item.item_id);
        } else {
            let video = self.artifacts.absolute_path(video_ref);
            let audio = self.artifacts.absolute_path(&audio_ref);
            if let Some(parent) = audio.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.with_timeout(self.extractor.extract(&video, &audio))
                .await?;
        }

        let next = Command::new(
            &item.item_id,
            &item.job_id,
            CommandPayload::Transcribe {
                audio_ref: audio_ref.clone(),
            },
        );
        Ok((audio_ref, Some(next)))
    }

    async fn run_transcribe(
        &self,
        item: &Item,
        audio_ref: &ArtifactRef,
    ) -> Result<(ArtifactRef, Option<Command>)> {
        if !self.artifacts.exists(audio_ref).await? {
            return Err(OppsumError::InputNotFound(audio_ref.to_string()));
        }

        let transcript_ref = self.artifacts.resolve(item, ArtifactKind::Transcript);
        if self.artifacts.exists(&transcript_ref).await? {
            debug!("[{}] Transcript already on disk", item.item_id);
        } else {
            let audio = self.artifacts.absolute_path(audio_ref);
            let result = self
                .with_timeout(self.transcriber.transcribe(&audio))
                .await?;
            info!(
                "[{}] Transcribed {} failed segment(s)",
                item.item_id, result.failed_segments
            );
            self.artifacts.write_text(&transcript_ref, &result.text).await?;
        }

        let next = Command::new(
            &item.item_id,
            &item.job_id,
            CommandPayload::Summarize {
                transcript_ref: transcript_ref.clone(),
            },
        );
        Ok((transcript_ref, Some(next)))
    }

    async fn run_summarize(
        &self,
        item: &Item,
        transcript_ref: &ArtifactRef,
    ) -> Result<(ArtifactRef, Option<Command>)> {
        let summary_ref = self.artifacts.resolve(item, ArtifactKind::Summary);
        if self.artifacts.exists(&summary_ref).await? {
            debug!("[{}] Summary already on disk", item.item_id);
        } else {
            let transcript = self.artifacts.read_text(transcript_ref).await?;
            let result = self.reducer.summarize(&transcript).await;
            info!(
                "[{}] Summary produced ({:?}, {} round(s))",
                item.item_id, result.kind, result.rounds
            );
            self.artifacts.write_text(&summary_ref, &result.text).await?;
        }

        Ok((summary_ref, None))
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(self.tool_timeout, fut)
            .await
            .map_err(|_| OppsumError::Timeout("external tool".to_string()))?
    }
}

fn item_from_metadata(meta: &ItemMetadata, job_id: &str) -> Item {
    Item {
        item_id: meta.video_id.clone(),
        job_id: job_id.to_string(),
        title: meta.title.clone(),
        duration_seconds: meta.duration_seconds,
        has_captions: meta.has_captions,
        upload_date: meta.upload_date.clone(),
        stage_status: StageStatus::Discovered,
        working_artifact_ref: None,
        error_kind: None,
        updated_at: Utc::now(),
    }
}

/// Wire the production pipeline from settings. Returns the bus alongside the
/// orchestrator so the caller can take stage receivers and subscribe to events.
pub fn build_pipeline(settings: &Settings) -> Result<(Arc<InMemoryBus>, Arc<Orchestrator>)> {
    let bus = Arc::new(InMemoryBus::new(settings.pipeline.queue_capacity));
    let store: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(&settings.sqlite_path())?);
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(settings.data_dir()));

    let transcriber: Arc<dyn Transcriber> = Arc::new(ChunkedTranscriber::new(
        Arc::new(WhisperBackend::new(&settings.transcription.model)),
        settings.transcription.segment_seconds,
        settings.transcription.max_concurrent_segments,
        Duration::from_secs(settings.transcription.call_timeout_seconds),
    ));
    let reducer = Reducer::new(
        Arc::new(OpenAiSummarizer::new(&settings.summarization.model)),
        ReducerConfig::from_settings(&settings.summarization),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        artifacts,
        bus.clone(),
        Arc::new(YtDlpFetcher::new()),
        Arc::new(YtDlpDownloader::new()),
        Arc::new(FfmpegExtractor::new()),
        transcriber,
        reducer,
        DiscoveryLimits {
            max_videos: settings.discovery.max_videos,
            max_duration_seconds: settings.discovery.max_duration_seconds,
        },
        Duration::from_secs(settings.pipeline.tool_timeout_seconds),
    ));

    Ok((bus, orchestrator))
}
