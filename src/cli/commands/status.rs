//! Status command - show pipeline state of tracked items.

use crate::cli::Output;
use crate::config::Settings;
use crate::model::StageStatus;
use crate::store::{ItemStore, SqliteItemStore};

/// List tracked items with their pipeline status, newest first.
pub async fn run_status(job: Option<&str>, settings: Settings) -> anyhow::Result<()> {
    let store = SqliteItemStore::new(&settings.sqlite_path())?;
    let items = store.list_items(job).await?;

    if items.is_empty() {
        Output::info("No tracked items.");
        return Ok(());
    }

    Output::header(&format!("Tracked items ({})", items.len()));
    for item in &items {
        Output::item_line(item);
    }

    let summarized = items
        .iter()
        .filter(|i| i.stage_status == StageStatus::Summarized)
        .count();
    let failed = items
        .iter()
        .filter(|i| i.stage_status == StageStatus::Failed)
        .count();
    let in_flight = items.len() - summarized - failed;

    println!();
    Output::kv("Summarized", &summarized.to_string());
    Output::kv("Failed", &failed.to_string());
    Output::kv("In flight", &in_flight.to_string());

    Ok(())
}
