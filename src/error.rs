//! Error types for oppsum.

use crate::model::ErrorKind;
use thiserror::Error;

/// Library-level error type for oppsum operations.
#[derive(Error, Debug)]
pub enum OppsumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Item store error: {0}")]
    Store(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Required input artifact missing: {0}")]
    InputNotFound(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl OppsumError {
    /// Map an error onto the failure taxonomy recorded on items and
    /// published in failure events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OppsumError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::InputNotFound
            }
            OppsumError::UnknownItem(_) | OppsumError::InputNotFound(_) => ErrorKind::InputNotFound,
            OppsumError::Config(_)
            | OppsumError::InvalidInput(_)
            | OppsumError::Json(_)
            | OppsumError::TomlParse(_) => ErrorKind::Validation,
            OppsumError::Http(_) | OppsumError::Timeout(_) | OppsumError::Io(_) => {
                ErrorKind::TransientIo
            }
            OppsumError::OpenAI(_)
            | OppsumError::Discovery(_)
            | OppsumError::Download(_)
            | OppsumError::AudioExtraction(_)
            | OppsumError::Transcription(_)
            | OppsumError::Summarization(_)
            | OppsumError::ToolNotFound(_)
            | OppsumError::ToolFailed(_) => ErrorKind::BackendCall,
            OppsumError::Store(_) | OppsumError::Bus(_) | OppsumError::Database(_) => {
                ErrorKind::TransientIo
            }
        }
    }
}

/// Result type alias for oppsum operations.
pub type Result<T> = std::result::Result<T, OppsumError>;
