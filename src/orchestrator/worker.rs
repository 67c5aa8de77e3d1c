//! Stage worker loops.

use super::Orchestrator;
use crate::bus::InMemoryBus;
use crate::model::Stage;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawn one consumer loop per stage queue.
///
/// Each command runs on its own task so a slow download never blocks a
/// transcription. Handler errors are logged and the loop moves on; failed
/// items carry their own terminal status, so there is nothing to retry here.
pub fn run_workers(bus: Arc<InMemoryBus>, orchestrator: Arc<Orchestrator>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for stage in Stage::ALL {
        let Some(mut commands) = bus.take_commands(stage) else {
            // Receiver already taken; the caller owns this stage's loop.
            continue;
        };
        let orchestrator = orchestrator.clone();

        handles.push(tokio::spawn(async move {
            info!("Worker for {} stage started", stage);
            while let Some(command) = commands.recv().await {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    let item_id = command.item_id.clone();
                    if let Err(e) = orchestrator.handle(command).await {
                        error!("[{}] {} command failed: {}", item_id, stage, e);
                    }
                });
            }
            info!("Worker for {} stage stopped", stage);
        }));
    }

    handles
}
