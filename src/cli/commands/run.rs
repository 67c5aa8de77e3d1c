//! Run command - process a channel or video in the foreground.

use crate::cli::Output;
use crate::config::Settings;
use crate::model::{Command, CommandPayload, StageStatus};
use crate::orchestrator::{build_pipeline, run_workers};
use std::time::Duration;
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Discover the input, then drive every registered item to a terminal
/// status before returning.
pub async fn run_run(
    input: &str,
    max_videos: Option<usize>,
    settings: Settings,
) -> anyhow::Result<()> {
    let (bus, orchestrator) = build_pipeline(&settings)?;
    let store = orchestrator.store();
    let job_id = Uuid::new_v4().to_string();

    let spinner = Output::spinner(&format!("Discovering videos from {}", input));
    orchestrator
        .handle(Command::new(
            job_id.clone(),
            job_id.clone(),
            CommandPayload::Discover {
                channel_url: input.to_string(),
                max_videos,
            },
        ))
        .await?;
    spinner.finish_and_clear();

    let items = store.list_items(Some(&job_id)).await?;
    if items.is_empty() {
        Output::info("No new videos to process (already tracked, or none found).");
        return Ok(());
    }
    Output::success(&format!("Registered {} video(s)", items.len()));

    let handles = run_workers(bus, orchestrator);

    let pb = Output::progress_bar(items.len() as u64, "processing");
    loop {
        let items = store.list_items(Some(&job_id)).await?;
        let done = items
            .iter()
            .filter(|i| i.stage_status.is_terminal())
            .count();
        pb.set_position(done as u64);
        if done == items.len() {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    pb.finish_and_clear();

    for handle in handles {
        handle.abort();
    }

    let items = store.list_items(Some(&job_id)).await?;
    let summarized = items
        .iter()
        .filter(|i| i.stage_status == StageStatus::Summarized)
        .count();
    let failed = items.len() - summarized;

    Output::header("Results");
    for item in &items {
        Output::item_line(item);
    }
    println!();
    if failed > 0 {
        Output::warning(&format!("{} summarized, {} failed", summarized, failed));
    } else {
        Output::success(&format!("All {} video(s) summarized", summarized));
    }

    Ok(())
}
