//! Configuration settings for oppsum.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub discovery: DiscoverySettings,
    pub transcription: TranscriptionSettings,
    pub summarization: SummarizationSettings,
    pub store: StoreSettings,
    pub pipeline: PipelineSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing pipeline artifacts (videos, audio, transcripts, summaries).
    pub data_dir: String,
    /// Directory for temporary files.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.oppsum".to_string(),
            temp_dir: "/tmp/oppsum".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Channel discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Maximum number of videos to discover per job.
    pub max_videos: usize,
    /// Skip videos longer than this (in seconds).
    pub max_duration_seconds: u32,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_videos: 10,
            max_duration_seconds: 7200, // 2 hours
        }
    }
}

/// Transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Speech model to use.
    pub model: String,
    /// Length of each audio segment sent to the speech backend, in seconds.
    pub segment_seconds: u32,
    /// Maximum concurrent segment transcriptions.
    pub max_concurrent_segments: usize,
    /// Timeout for one segment transcription call, in seconds.
    pub call_timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            segment_seconds: 120,
            max_concurrent_segments: 3,
            call_timeout_seconds: 300,
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationSettings {
    /// When false, transcripts pass through verbatim (non-billable dry runs).
    pub enabled: bool,
    /// Chat model used for summarization calls.
    pub model: String,
    /// Maximum tokens sent to the model in one call.
    pub token_budget: usize,
    /// Target token count per chunk when a transcript is over budget.
    pub chunk_target_tokens: usize,
    /// Maximum recursive reduction rounds before falling back.
    pub max_depth: usize,
    /// Maximum concurrent chunk summarization calls.
    pub max_concurrent_chunks: usize,
    /// Timeout for one summarization call, in seconds.
    pub call_timeout_seconds: u64,
}

impl Default for SummarizationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            token_budget: 4000,
            chunk_target_tokens: 3000,
            max_depth: 4,
            max_concurrent_chunks: 2,
            call_timeout_seconds: 300,
        }
    }
}

/// Item store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database holding item records.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.oppsum/items.db".to_string(),
        }
    }
}

/// Stage worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Timeout for one pipeline tool invocation, in seconds.
    pub tool_timeout_seconds: u64,
    /// Command queue capacity per stage.
    pub queue_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            tool_timeout_seconds: 1800, // 30 minutes; downloads dominate
            queue_capacity: 256,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::OppsumError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oppsum")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}
