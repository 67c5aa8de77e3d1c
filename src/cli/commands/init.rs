//! Init command - first-run setup and prerequisite checks.

use crate::cli::Output;
use crate::config::Settings;
use crate::openai::is_api_key_configured;
use console::style;
use std::io::{self, Write};

/// External tools the pipeline shells out to.
const REQUIRED_TOOLS: [&str; 3] = ["yt-dlp", "ffmpeg", "ffprobe"];

/// Check the environment and prepare directories and config.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Setting up oppsum");
    println!();

    let missing = missing_tools();
    for tool in REQUIRED_TOOLS {
        if missing.contains(&tool) {
            println!("  {} {}", style("✗").red(), style(tool).bold());
            println!("    {}", style(install_hint(tool)).dim());
        } else {
            println!("  {} {}", style("✓").green(), tool);
        }
    }
    println!();

    if !missing.is_empty() && !prompt_continue("Some tools are missing. Continue anyway?")? {
        Output::info("Install the tools above, then rerun 'oppsum init'.");
        return Ok(());
    }

    if is_api_key_configured() {
        Output::success("OPENAI_API_KEY is set");
    } else {
        Output::warning("OPENAI_API_KEY is not set");
        println!("  Transcription and summarization calls need one:");
        println!("  {}", style("export OPENAI_API_KEY='sk-...'").green());
        println!(
            "  Keys: {}",
            style("https://platform.openai.com/api-keys").underlined()
        );
        println!();
        if !prompt_continue("Continue without an API key?")? {
            Output::info("Set the key, then rerun 'oppsum init'.");
            return Ok(());
        }
    }
    println!();

    for dir in [settings.data_dir(), settings.temp_dir()] {
        if dir.exists() {
            Output::info(&format!("Using {}", dir.display()));
        } else {
            std::fs::create_dir_all(&dir)?;
            Output::success(&format!("Created {}", dir.display()));
        }
    }
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config: {}", config_path.display()));
    } else if prompt_continue("Write a default config file?")? {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        settings.save_to(&config_path)?;
        Output::success(&format!("Wrote {}", config_path.display()));
    } else {
        Output::info("No config file written; built-in defaults apply.");
    }
    println!();

    Output::success("Ready.");
    println!(
        "Summarize a channel with {}, or start the API with {}.",
        style("oppsum run <channel-url>").cyan(),
        style("oppsum serve").cyan()
    );

    Ok(())
}

fn missing_tools() -> Vec<&'static str> {
    use std::process::Command;

    REQUIRED_TOOLS
        .into_iter()
        .filter(|tool| {
            Command::new(tool)
                .arg(version_flag(tool))
                .output()
                .is_err()
        })
        .collect()
}

/// ffmpeg and ffprobe only understand the single-dash form.
fn version_flag(tool: &str) -> &'static str {
    if tool == "yt-dlp" {
        "--version"
    } else {
        "-version"
    }
}

/// Get platform-specific install hint.
fn install_hint(tool: &str) -> &'static str {
    match tool {
        "yt-dlp" => {
            if cfg!(target_os = "macos") {
                "Install with: brew install yt-dlp"
            } else if cfg!(target_os = "linux") {
                "Install with: pip install yt-dlp"
            } else {
                "Install from: https://github.com/yt-dlp/yt-dlp"
            }
        }
        "ffmpeg" | "ffprobe" => {
            if cfg!(target_os = "macos") {
                "Install with: brew install ffmpeg"
            } else if cfg!(target_os = "linux") {
                "Install with: sudo apt install ffmpeg"
            } else {
                "Install from: https://ffmpeg.org/download.html"
            }
        }
        _ => "Check the documentation for installation instructions",
    }
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_lowercase() == "y" || input.trim().to_lowercase() == "yes")
}
