use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Booking, BookingStatus, Event, EventStats, OverallReport};

/// Narrow interface over durable event/booking storage.
///
/// The only hard requirement is `commit_booking`: the capacity decrement
/// and the booking insert must land together or not at all, and the
/// decrement must refuse to go below zero.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create_event(&self, name: &str, total_capacity: i32) -> Result<Event, StoreError>;

    async fn get_event(&self, id: Uuid) -> Result<Event, StoreError>;

    /// Atomically reserve `quantity` tickets and insert the PENDING
    /// booking row. Fails with `Conflict` when available capacity has
    /// dropped below `quantity`, even if the admission lock let the
    /// caller through.
    async fn commit_booking(&self, event_id: Uuid, quantity: i32) -> Result<Booking, StoreError>;

    /// Transition a booking's status. Idempotent for a repeated identical
    /// terminal status; changing an already-terminal booking to a
    /// different status fails with `Conflict`.
    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Booking, StoreError>;

    /// PENDING bookings created before `cutoff`, for the reconciliation
    /// sweep to re-enqueue.
    async fn pending_bookings_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn event_stats(&self, event_id: Uuid) -> Result<EventStats, StoreError>;

    async fn overall_report(&self) -> Result<OverallReport, StoreError>;
}
