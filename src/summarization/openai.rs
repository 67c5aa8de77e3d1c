//! OpenAI chat-completion summarization backend.

use super::{SummarizationBackend, SummaryContext};
use crate::error::{OppsumError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You are a summary assistant. You produce concise, \
faithful summaries of video transcripts.";

/// Chat-completion backed summarizer.
pub struct OpenAiSummarizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }

    fn user_prompt(text: &str, context: SummaryContext) -> String {
        match context {
            SummaryContext::WholeDocument => format!("Summarize this transcript:\n\n{}", text),
            SummaryContext::PartialInput => format!(
                "The following is one excerpt of a longer transcript. Summarize \
                 the excerpt on its own; do not assume it is complete:\n\n{}",
                text
            ),
        }
    }
}

#[async_trait]
impl SummarizationBackend for OpenAiSummarizer {
    #[instrument(skip(self, text), fields(chars = text.len(), context = ?context))]
    async fn summarize(&self, text: &str, context: SummaryContext) -> Result<String> {
        debug!("Requesting summary");

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| OppsumError::Summarization(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::user_prompt(text, context))
                .build()
                .map_err(|e| OppsumError::Summarization(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| OppsumError::Summarization(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| OppsumError::OpenAI(format!("Summarization call failed: {}", e)))?;

        let summary = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| {
                OppsumError::Summarization("Empty response from model".to_string())
            })?
            .trim()
            .to_string();

        if summary.is_empty() {
            return Err(OppsumError::Summarization(
                "Model returned an empty summary".to_string(),
            ));
        }
        Ok(summary)
    }
}
