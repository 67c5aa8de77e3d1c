//! Transcript summarization.
//!
//! The reducer compresses arbitrarily long transcripts under a fixed token
//! budget: a transcript within budget gets one summarization call, anything
//! larger is chunk-reduced recursively. Every failure path degrades to some
//! non-empty text; an unsummarized transcript is strictly more valuable than
//! no summary at all.

mod openai;
mod reducer;

pub use openai::OpenAiSummarizer;
pub use reducer::{estimate_tokens, split_sentences, Chunk, Reducer, ReducerConfig};

use crate::error::Result;
use async_trait::async_trait;

/// How a summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// Summarization disabled; input passed through verbatim.
    Direct,
    /// Normal reduction (single-shot or hierarchical).
    Reduced,
    /// The backend failed before any reduction; original text returned.
    FallbackRaw,
    /// Reduction was cut short; partially reduced text returned.
    FallbackPartial,
}

/// Result of a summarization run.
#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub text: String,
    pub kind: SummaryKind,
    /// Number of backend passes (chunk rounds plus the final call).
    pub rounds: usize,
}

/// Framing passed to the backend with each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryContext {
    /// The text is a complete document.
    WholeDocument,
    /// The text is one chunk of a longer document; the model must not
    /// assume whole-document framing.
    PartialInput,
}

/// Backend that performs one summarization call.
#[async_trait]
pub trait SummarizationBackend: Send + Sync {
    async fn summarize(&self, text: &str, context: SummaryContext) -> Result<String>;
}
