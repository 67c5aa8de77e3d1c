//! Recursive summarization reducer.

use super::{SummarizationBackend, SummaryContext, SummaryKind, SummaryResult};
use crate::error::{OppsumError, Result};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Reducer tuning knobs.
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// When false, input passes through verbatim (dry-run mode).
    pub enabled: bool,
    /// Maximum tokens sent to the backend in one call.
    pub token_budget: usize,
    /// Target token count per chunk during a reduction round.
    pub chunk_target_tokens: usize,
    /// Maximum reduction rounds before giving up; guards the pathological
    /// case where a summary is not shorter than its source.
    pub max_depth: usize,
    /// Maximum concurrent chunk calls.
    pub max_concurrent_chunks: usize,
    /// Timeout for one backend call.
    pub call_timeout: Duration,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_budget: 4000,
            chunk_target_tokens: 3000,
            max_depth: 4,
            max_concurrent_chunks: 2,
            call_timeout: Duration::from_secs(300),
        }
    }
}

impl ReducerConfig {
    pub fn from_settings(settings: &crate::config::SummarizationSettings) -> Self {
        Self {
            enabled: settings.enabled,
            token_budget: settings.token_budget.max(1),
            chunk_target_tokens: settings.chunk_target_tokens.max(1),
            max_depth: settings.max_depth.max(1),
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
            call_timeout: Duration::from_secs(settings.call_timeout_seconds),
        }
    }
}

/// A token-bounded slice of transcript text.
///
/// Concatenating chunk texts in index order reconstructs the source exactly.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub token_count: usize,
    pub text: String,
}

/// Compresses transcripts under a fixed token budget, recursively, with
/// graceful degradation when the backend fails.
pub struct Reducer {
    backend: Arc<dyn SummarizationBackend>,
    config: ReducerConfig,
}

impl Reducer {
    pub fn new(backend: Arc<dyn SummarizationBackend>, config: ReducerConfig) -> Self {
        Self { backend, config }
    }

    /// Summarize `text`. Never returns an empty summary when any usable text
    /// exists; the worst outcome is the input handed back as a fallback.
    #[instrument(skip_all, fields(tokens = estimate_tokens(text)))]
    pub async fn summarize(&self, text: &str) -> SummaryResult {
        if !self.config.enabled {
            debug!("Summarization disabled; passing input through");
            return SummaryResult {
                text: text.to_string(),
                kind: SummaryKind::Direct,
                rounds: 0,
            };
        }

        let mut current = text.to_string();
        let mut rounds = 0usize;
        let mut reduced_once = false;

        loop {
            let tokens = estimate_tokens(&current);

            if tokens <= self.config.token_budget {
                // Within budget: one call finishes the reduction.
                return match self.call(&current, SummaryContext::WholeDocument).await {
                    Ok(summary) => SummaryResult {
                        text: summary,
                        kind: SummaryKind::Reduced,
                        rounds: rounds + 1,
                    },
                    Err(e) => {
                        warn!("Final summarization call failed: {}", e);
                        self.fallback(text, current, reduced_once, rounds)
                    }
                };
            }

            if rounds >= self.config.max_depth {
                warn!(
                    "Reduction depth cap ({}) reached at {} tokens",
                    self.config.max_depth, tokens
                );
                return self.fallback(text, current, reduced_once, rounds);
            }

            // Over budget: chunk-reduce one level.
            let target = self.config.chunk_target_tokens.min(self.config.token_budget);
            let chunks = build_chunks(&current, target);
            info!(
                "Round {}: reducing {} tokens across {} chunks",
                rounds + 1,
                tokens,
                chunks.len()
            );

            let (summaries, failed) = self.summarize_chunks(&chunks).await;

            if failed > 0 {
                warn!(
                    "{} of {} chunk calls failed; joining what succeeded",
                    failed,
                    chunks.len()
                );
                if summaries.is_empty() {
                    return self.fallback(text, current, reduced_once, rounds);
                }
                return SummaryResult {
                    text: summaries.join("\n\n"),
                    kind: SummaryKind::FallbackPartial,
                    rounds: rounds + 1,
                };
            }

            current = summaries.join("\n\n");
            rounds += 1;
            reduced_once = true;
        }
    }

    /// Summarize every chunk, preserving index order in the output.
    /// Returns the successful summaries and the count of failed calls.
    async fn summarize_chunks(&self, chunks: &[Chunk]) -> (Vec<String>, usize) {
        // The futures are built eagerly and boxed to work around
        // rust-lang/rust#102211: mapping the stream through a closure that
        // returns an opaque future makes the `Send` check fail at the spawn
        // site. Async blocks are lazy, so nothing runs until
        // `buffer_unordered` polls them.
        let futures: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                async move {
                    let result = self.call(&chunk.text, SummaryContext::PartialInput).await;
                    (chunk.index, result)
                }
                .boxed()
            })
            .collect();
        let mut results: Vec<(usize, Result<String>)> = stream::iter(futures)
            .buffer_unordered(self.config.max_concurrent_chunks)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);

        let mut summaries = Vec::new();
        let mut failed = 0;
        for (index, result) in results {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    warn!("Chunk {} summarization failed: {}", index, e);
                    failed += 1;
                }
            }
        }
        (summaries, failed)
    }

    /// One backend call with timeout; empty completions count as failures.
    async fn call(&self, text: &str, context: SummaryContext) -> Result<String> {
        let result = timeout(self.config.call_timeout, self.backend.summarize(text, context))
            .await
            .map_err(|_| OppsumError::Timeout("summarization call".to_string()))??;

        if result.trim().is_empty() {
            return Err(OppsumError::Summarization(
                "Backend returned an empty summary".to_string(),
            ));
        }
        Ok(result)
    }

    /// Degraded result when reduction cannot finish. Partially reduced text
    /// wins over the raw original when at least one round completed.
    fn fallback(
        &self,
        original: &str,
        current: String,
        reduced_once: bool,
        rounds: usize,
    ) -> SummaryResult {
        if reduced_once && !current.trim().is_empty() {
            SummaryResult {
                text: current,
                kind: SummaryKind::FallbackPartial,
                rounds,
            }
        } else {
            SummaryResult {
                text: original.to_string(),
                kind: SummaryKind::FallbackRaw,
                rounds,
            }
        }
    }
}

/// Deterministic token estimate: one token per four bytes, with a floor of
/// one per whitespace-delimited word.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    words.max(text.len() / 4)
}

/// Split text into sentences, keeping every byte: concatenating the pieces
/// reconstructs the input exactly. A sentence ends at `.`, `!`, `?`, or a
/// newline when followed by whitespace or end of input.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let at_break = iter
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if at_break {
                let end = i + c.len_utf8();
                pieces.push(&text[start..end]);
                start = end;
            }
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Pack sentences into chunks of at most `target` tokens. A single sentence
/// over the target is further packed on word boundaries, so chunk boundaries
/// never fall inside a word and the round-trip law holds.
pub fn build_chunks(text: &str, target: usize) -> Vec<Chunk> {
    let mut pieces: Vec<&str> = Vec::new();
    for sentence in split_sentences(text) {
        if estimate_tokens(sentence) > target {
            pieces.extend(sentence.split_inclusive(char::is_whitespace));
        } else {
            pieces.push(sentence);
        }
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buf = String::new();

    for piece in pieces {
        let combined = estimate_tokens(&buf) + estimate_tokens(piece);
        if !buf.is_empty() && combined > target {
            chunks.push(Chunk {
                index: chunks.len(),
                token_count: estimate_tokens(&buf),
                text: std::mem::take(&mut buf),
            });
        }
        buf.push_str(piece);
    }

    if !buf.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            token_count: estimate_tokens(&buf),
            text: buf,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend returning a fixed short summary for every call.
    struct FixedBackend {
        summary: String,
        calls: AtomicUsize,
    }

    impl FixedBackend {
        fn new(summary: &str) -> Self {
            Self {
                summary: summary.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SummarizationBackend for FixedBackend {
        async fn summarize(&self, _text: &str, _context: SummaryContext) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.summary.clone())
        }
    }

    /// Backend that fails every call.
    struct FailingBackend;

    #[async_trait]
    impl SummarizationBackend for FailingBackend {
        async fn summarize(&self, _text: &str, _context: SummaryContext) -> Result<String> {
            Err(OppsumError::OpenAI("backend down".to_string()))
        }
    }

    /// Backend that echoes its input: summaries never shrink.
    struct EchoBackend;

    #[async_trait]
    impl SummarizationBackend for EchoBackend {
        async fn summarize(&self, text: &str, _context: SummaryContext) -> Result<String> {
            Ok(text.to_string())
        }
    }

    /// Backend that fails only on partial-input (chunk) calls.
    struct ChunkFailingBackend;

    #[async_trait]
    impl SummarizationBackend for ChunkFailingBackend {
        async fn summarize(&self, _text: &str, context: SummaryContext) -> Result<String> {
            match context {
                SummaryContext::PartialInput => {
                    Err(OppsumError::OpenAI("chunk call failed".to_string()))
                }
                SummaryContext::WholeDocument => Ok("whole summary".to_string()),
            }
        }
    }

    fn config() -> ReducerConfig {
        ReducerConfig {
            enabled: true,
            token_budget: 4000,
            chunk_target_tokens: 3000,
            max_depth: 4,
            max_concurrent_chunks: 2,
            call_timeout: Duration::from_secs(5),
        }
    }

    fn long_transcript(sentences: usize) -> String {
        "the quick brown fox jumps over the lazy dog. ".repeat(sentences)
    }

    #[tokio::test]
    async fn test_disabled_passes_through_verbatim() {
        let mut cfg = config();
        cfg.enabled = false;
        let reducer = Reducer::new(Arc::new(FailingBackend), cfg);

        let result = reducer.summarize("raw transcript text").await;
        assert_eq!(result.kind, SummaryKind::Direct);
        assert_eq!(result.text, "raw transcript text");
        assert_eq!(result.rounds, 0);
    }

    #[tokio::test]
    async fn test_within_budget_is_single_shot() {
        let backend = Arc::new(FixedBackend::new("short summary"));
        let reducer = Reducer::new(backend.clone(), config());

        let result = reducer.summarize("a short transcript.").await;
        assert_eq!(result.kind, SummaryKind::Reduced);
        assert_eq!(result.text, "short summary");
        assert_eq!(result.rounds, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_large_transcript_reduces_in_multiple_rounds() {
        // ~50k tokens against a 4k budget
        let transcript = long_transcript(5600);
        assert!(estimate_tokens(&transcript) >= 50_000);

        let reducer = Reducer::new(
            Arc::new(FixedBackend::new("A summary of part of the video.")),
            config(),
        );

        let result = reducer.summarize(&transcript).await;
        assert_eq!(result.kind, SummaryKind::Reduced);
        assert!(result.rounds >= 2, "expected >=2 rounds, got {}", result.rounds);
        assert!(estimate_tokens(&result.text) <= 4000);
        assert!(!result.text.is_empty());
    }

    #[tokio::test]
    async fn test_failing_backend_falls_back_to_raw() {
        let reducer = Reducer::new(Arc::new(FailingBackend), config());

        let result = reducer.summarize("some transcript content.").await;
        assert_eq!(result.kind, SummaryKind::FallbackRaw);
        assert_eq!(result.text, "some transcript content.");
    }

    #[tokio::test]
    async fn test_failing_backend_never_returns_empty_even_when_over_budget() {
        let transcript = long_transcript(2000);
        let reducer = Reducer::new(Arc::new(FailingBackend), config());

        let result = reducer.summarize(&transcript).await;
        assert_eq!(result.kind, SummaryKind::FallbackRaw);
        assert!(!result.text.is_empty());
        assert_eq!(result.text, transcript);
    }

    #[tokio::test]
    async fn test_chunk_failures_fall_back_without_losing_text() {
        // Chunk calls fail; a within-budget text goes straight to the final
        // (whole-document) call and still succeeds.
        let reducer = Reducer::new(Arc::new(ChunkFailingBackend), config());
        let small = reducer.summarize("tiny input.").await;
        assert_eq!(small.kind, SummaryKind::Reduced);

        // Over budget: every chunk call fails, nothing was reduced yet,
        // so the original comes back.
        let transcript = long_transcript(2000);
        let large = reducer.summarize(&transcript).await;
        assert_eq!(large.kind, SummaryKind::FallbackRaw);
        assert_eq!(large.text, transcript);
    }

    #[tokio::test]
    async fn test_non_shrinking_summaries_hit_depth_cap() {
        let mut cfg = config();
        cfg.max_depth = 3;
        let transcript = long_transcript(2000);
        let reducer = Reducer::new(Arc::new(EchoBackend), cfg);

        let result = reducer.summarize(&transcript).await;
        // Echo never shrinks below budget, so the cap fires; the result is
        // the partially "reduced" text, never empty.
        assert_eq!(result.kind, SummaryKind::FallbackPartial);
        assert!(!result.text.is_empty());
        assert_eq!(result.rounds, 3);
    }

    #[tokio::test]
    async fn test_termination_across_increasing_sizes() {
        let reducer = Reducer::new(Arc::new(FixedBackend::new("s.")), config());
        for sentences in [10, 500, 2000, 8000] {
            let transcript = long_transcript(sentences);
            let result = reducer.summarize(&transcript).await;
            assert!(!result.text.is_empty(), "empty result at {}", sentences);
            assert!(result.rounds <= config().max_depth + 1);
        }
    }

    #[test]
    fn test_split_sentences_round_trip() {
        let text = "First sentence. Second one! Third?\nFourth without end";
        let pieces = split_sentences(text);
        assert_eq!(pieces.concat(), text);
        assert_eq!(pieces.len(), 4);
    }

    #[test]
    fn test_split_sentences_ignores_inline_dots() {
        let text = "Version 1.5 shipped today. It works.";
        let pieces = split_sentences(text);
        assert_eq!(pieces.concat(), text);
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn test_build_chunks_round_trip() {
        let text = long_transcript(400);
        let chunks = build_chunks(&text, 100);
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.token_count, estimate_tokens(&chunk.text));
        }
    }

    #[test]
    fn test_build_chunks_indexes_are_ordered() {
        let text = long_transcript(100);
        let chunks = build_chunks(&text, 50);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_build_chunks_splits_oversized_sentence_on_words() {
        // One giant "sentence" with no terminators
        let text = "word ".repeat(1000);
        let chunks = build_chunks(&text, 100);
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 101, "chunk of {} tokens", chunk.token_count);
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one two three"), 3);
        // Long unbroken text falls back to the byte heuristic
        let blob = "a".repeat(400);
        assert_eq!(estimate_tokens(&blob), 100);
    }
}
