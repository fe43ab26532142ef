use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QueueError;

/// Producer/consumer channel carrying booking ids awaiting finalization.
///
/// Delivery is at-least-once: a crashed worker's in-flight item may be
/// seen again, and the reconciliation sweep re-enqueues stragglers, so
/// consumers must treat redelivery as a no-op. Best-effort FIFO per
/// event; no ordering across events.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, booking_id: Uuid) -> Result<(), QueueError>;

    /// Pop the next booking id, waiting at most `wait`. `Ok(None)` means
    /// nothing arrived in the window, which lets workers check for
    /// shutdown between polls.
    async fn dequeue(&self, wait: Duration) -> Result<Option<Uuid>, QueueError>;
}
