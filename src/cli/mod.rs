//! CLI module for Oppsum.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Oppsum - Video Catalog Summarizer
///
/// Discovers videos from a channel, downloads them, transcribes the audio,
/// and produces summaries of every video. The name "Oppsum" comes from the
/// Norwegian "oppsummering," a summary.
#[derive(Parser, Debug)]
#[command(name = "oppsum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Oppsum and verify system requirements
    Init,

    /// Process a channel or video URL end to end in the foreground
    Run {
        /// Channel URL, video URL, or video ID
        input: String,

        /// Maximum number of videos to process from a channel
        #[arg(short, long)]
        max_videos: Option<usize>,
    },

    /// Submit a job to a running Oppsum server
    Submit {
        /// Channel URL, video URL, or video ID
        input: String,

        /// Server base URL
        #[arg(short, long, default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Maximum number of videos to process from a channel
        #[arg(short, long)]
        max_videos: Option<usize>,
    },

    /// Show pipeline status for tracked items
    Status {
        /// Restrict to one job
        #[arg(short, long)]
        job: Option<String>,
    },

    /// Start the HTTP API server and pipeline workers
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
