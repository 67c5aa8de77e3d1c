//! In-process bus implementation.
//!
//! One bounded mpsc queue per stage for commands, a broadcast channel for
//! events. Suitable for single-process deployments and tests; the trait seam
//! keeps a broker-backed implementation possible without touching the
//! orchestrator.

use super::MessageBus;
use crate::error::{OppsumError, Result};
use crate::model::{Command, Event, Stage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// In-process command queues and event channel.
pub struct InMemoryBus {
    senders: HashMap<Stage, mpsc::Sender<Command>>,
    receivers: Mutex<HashMap<Stage, mpsc::Receiver<Command>>>,
    events: broadcast::Sender<Event>,
}

impl InMemoryBus {
    /// Create queues for every stage with the given per-queue capacity.
    pub fn new(queue_capacity: usize) -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();

        for stage in Stage::ALL {
            let (tx, rx) = mpsc::channel(queue_capacity);
            senders.insert(stage, tx);
            receivers.insert(stage, rx);
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            senders,
            receivers: Mutex::new(receivers),
            events,
        }
    }

    /// Take the command receiver for a stage. Each stage has one consumer
    /// per process; calling twice returns None.
    pub fn take_commands(&self, stage: Stage) -> Option<mpsc::Receiver<Command>> {
        self.receivers
            .lock()
            .ok()
            .and_then(|mut map| map.remove(&stage))
    }

    /// Subscribe to the event fan-out.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn send_command(&self, command: Command) -> Result<()> {
        let sender = self
            .senders
            .get(&command.stage)
            .ok_or_else(|| OppsumError::Bus(format!("No queue for stage {}", command.stage)))?;

        debug!(
            "[{}] Enqueueing {} command",
            command.item_id, command.stage
        );

        sender
            .send(command)
            .await
            .map_err(|e| OppsumError::Bus(format!("Command queue closed: {}", e)))
    }

    async fn publish_event(&self, event: Event) -> Result<()> {
        // A send error just means nobody is listening right now; events are
        // advisory and at-least-once, so that is not a failure.
        if self.events.send(event.clone()).is_err() {
            warn!(
                "[{}] No event subscribers for {} event",
                event.item_id, event.stage
            );
        }
        Ok(())
    }
}
