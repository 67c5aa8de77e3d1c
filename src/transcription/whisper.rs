//! OpenAI Whisper speech backend.

use super::SpeechBackend;
use crate::error::{OppsumError, Result};
use crate::openai::create_client;
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

/// Whisper-backed segment transcription.
pub struct WhisperBackend {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl WhisperBackend {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl SpeechBackend for WhisperBackend {
    #[instrument(skip(self), fields(audio = %audio.display()))]
    async fn transcribe_segment(&self, audio: &Path) -> Result<String> {
        debug!("Transcribing audio segment");

        let file_bytes = tokio::fs::read(audio).await?;

        let request = CreateTranscriptionRequestArgs::default()
            .file(async_openai::types::AudioInput::from_vec_u8(
                audio
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("segment.wav")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json)
            .build()
            .map_err(|e| OppsumError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| OppsumError::OpenAI(format!("Whisper API error: {}", e)))?;

        Ok(response.text.trim().to_string())
    }
}
