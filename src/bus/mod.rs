//! Command queue and event bus abstraction.
//!
//! Commands are point-to-point per stage; events fan out to every subscriber.
//! Delivery is at-least-once, so everything downstream of the bus must be
//! idempotent keyed by `item_id` + `stage`.

mod memory;

pub use memory::InMemoryBus;

use crate::error::Result;
use crate::model::{Command, Event};
use async_trait::async_trait;

/// Publishing side of the bus, as seen by a stage orchestrator.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Enqueue a command on its stage's queue.
    async fn send_command(&self, command: Command) -> Result<()>;

    /// Fan an event out to all subscribers.
    async fn publish_event(&self, event: Event) -> Result<()>;
}
