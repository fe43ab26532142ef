use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable event with a fixed ticket inventory.
///
/// `available_capacity` only moves through the store's atomic
/// decrement-if-sufficient primitive, so `0 <= available_capacity <=
/// total_capacity` holds under any interleaving of admissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub total_capacity: i32,
    pub available_capacity: i32,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: String, total_capacity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            total_capacity,
            available_capacity: total_capacity,
            created_at: Utc::now(),
        }
    }
}

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Finalized,
    Failed,
}

impl BookingStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Finalized | BookingStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Finalized => "FINALIZED",
            BookingStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "FINALIZED" => Some(BookingStatus::Finalized),
            "FAILED" => Some(BookingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation against an event's inventory.
///
/// The quantity was already subtracted from the event's available
/// capacity when the row was created; the two writes are one atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(event_id: Uuid, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            quantity,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Per-event inventory counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStats {
    pub event_id: Uuid,
    pub total_capacity: i32,
    pub available_capacity: i32,
    /// Tickets reserved against the inventory (PENDING, FINALIZED and
    /// FAILED alike; a failed finalization keeps its reservation).
    pub booked: i32,
    pub finalized: i32,
    pub failed: i32,
}

/// Aggregate counters across all events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallReport {
    pub total_capacity: i64,
    pub total_reserved: i64,
    pub total_finalized: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Finalized,
            BookingStatus::Failed,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("CONFIRMED"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(BookingStatus::Finalized.is_terminal());
        assert!(BookingStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_event_starts_full() {
        let event = Event::new("Launch Party".to_string(), 250);
        assert_eq!(event.available_capacity, event.total_capacity);
    }
}
