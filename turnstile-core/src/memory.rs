//! In-memory collaborator implementations.
//!
//! These back the test suites and single-process deployments; the
//! `turnstile-store` crate provides the Postgres/Redis equivalents with
//! the same contracts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::error::{LockError, QueueError, StoreError};
use crate::lock::{LockClient, LockToken};
use crate::model::{Booking, BookingStatus, Event, EventStats, OverallReport};
use crate::queue::WorkQueue;
use crate::store::InventoryStore;

#[derive(Default)]
struct StoreInner {
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
}

/// HashMap-backed inventory store.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Backend(format!("store mutex poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn create_event(&self, name: &str, total_capacity: i32) -> Result<Event, StoreError> {
        let event = Event::new(name.to_string(), total_capacity);
        let mut inner = self.locked()?;
        inner.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, StoreError> {
        let inner = self.locked()?;
        inner
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))
    }

    async fn commit_booking(&self, event_id: Uuid, quantity: i32) -> Result<Booking, StoreError> {
        let mut inner = self.locked()?;
        let event = inner
            .events
            .get_mut(&event_id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", event_id)))?;

        if event.available_capacity < quantity {
            return Err(StoreError::Conflict);
        }

        // Both writes happen under the same guard: one atomic unit.
        event.available_capacity -= quantity;
        let booking = Booking::new(event_id, quantity);
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.locked()?;
        let booking = inner
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;

        if booking.status == status {
            return Ok(());
        }
        if booking.status.is_terminal() {
            return Err(StoreError::Conflict);
        }
        booking.status = status;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking, StoreError> {
        let inner = self.locked()?;
        inner
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))
    }

    async fn pending_bookings_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.locked()?;
        let mut stale: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|b| b.created_at);
        Ok(stale)
    }

    async fn event_stats(&self, event_id: Uuid) -> Result<EventStats, StoreError> {
        let inner = self.locked()?;
        let event = inner
            .events
            .get(&event_id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", event_id)))?;

        let mut finalized = 0;
        let mut failed = 0;
        for booking in inner.bookings.values() {
            if booking.event_id != event_id {
                continue;
            }
            match booking.status {
                BookingStatus::Finalized => finalized += booking.quantity,
                BookingStatus::Failed => failed += booking.quantity,
                BookingStatus::Pending => {}
            }
        }

        Ok(EventStats {
            event_id,
            total_capacity: event.total_capacity,
            available_capacity: event.available_capacity,
            booked: event.total_capacity - event.available_capacity,
            finalized,
            failed,
        })
    }

    async fn overall_report(&self) -> Result<OverallReport, StoreError> {
        let inner = self.locked()?;
        let total_capacity: i64 = inner.events.values().map(|e| e.total_capacity as i64).sum();
        let total_reserved: i64 = inner
            .events
            .values()
            .map(|e| (e.total_capacity - e.available_capacity) as i64)
            .sum();
        let total_finalized: i64 = inner
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Finalized)
            .map(|b| b.quantity as i64)
            .sum();

        Ok(OverallReport {
            total_capacity,
            total_reserved,
            total_finalized,
        })
    }
}

struct Holder {
    token: String,
    expires_at: Instant,
}

/// Single-process lock client with the same lease semantics as the
/// Redis implementation: exclusive per key, auto-expiring, release
/// honored only for the owning token.
pub struct MemoryLockClient {
    locks: Mutex<HashMap<String, Holder>>,
    retry_interval: Duration,
}

impl MemoryLockClient {
    pub fn new() -> Self {
        Self::with_retry_interval(Duration::from_millis(10))
    }

    pub fn with_retry_interval(retry_interval: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            retry_interval,
        }
    }

    fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockToken>, LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| LockError::Backend(format!("lock table poisoned: {}", e)))?;

        let now = Instant::now();
        match locks.get(key) {
            Some(holder) if holder.expires_at > now => Ok(None),
            _ => {
                let token = LockToken::generate();
                locks.insert(
                    key.to_string(),
                    Holder {
                        token: token.as_str().to_string(),
                        expires_at: now + lease,
                    },
                );
                Ok(Some(token))
            }
        }
    }
}

impl Default for MemoryLockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockClient for MemoryLockClient {
    async fn acquire(
        &self,
        key: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<LockToken, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(token) = self.try_acquire(key, lease)? {
                return Ok(token);
            }
            if Instant::now() >= deadline {
                return Err(LockError::Contended(key.to_string()));
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| LockError::Backend(format!("lock table poisoned: {}", e)))?;

        // Stale or mismatched tokens are ignored.
        if locks.get(key).is_some_and(|h| h.token == token.as_str()) {
            locks.remove(key);
        }
        Ok(())
    }
}

/// Unbounded channel-backed work queue.
pub struct MemoryQueue {
    tx: mpsc::UnboundedSender<Uuid>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Uuid>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: AsyncMutex::new(rx),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(&self, booking_id: Uuid) -> Result<(), QueueError> {
        self.tx
            .send(booking_id)
            .map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Uuid>, QueueError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(id)) => Ok(Some(id)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_booking_reserves_capacity() {
        let store = MemoryStore::new();
        let event = store.create_event("Club Night", 5).await.unwrap();

        let booking = store.commit_booking(event.id, 2).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);

        let event = store.get_event(event.id).await.unwrap();
        assert_eq!(event.available_capacity, 3);
    }

    #[tokio::test]
    async fn test_commit_booking_refuses_shortage() {
        let store = MemoryStore::new();
        let event = store.create_event("Tiny Venue", 1).await.unwrap();

        store.commit_booking(event.id, 1).await.unwrap();
        let err = store.commit_booking(event.id, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // Capacity never dips below zero.
        let event = store.get_event(event.id).await.unwrap();
        assert_eq!(event.available_capacity, 0);
    }

    #[tokio::test]
    async fn test_status_update_idempotent_for_same_terminal() {
        let store = MemoryStore::new();
        let event = store.create_event("Idempotence Fest", 3).await.unwrap();
        let booking = store.commit_booking(event.id, 1).await.unwrap();

        store
            .update_booking_status(booking.id, BookingStatus::Finalized)
            .await
            .unwrap();
        // Second identical transition: no-op, not an error.
        store
            .update_booking_status(booking.id, BookingStatus::Finalized)
            .await
            .unwrap();

        // Crossing terminal states is refused.
        let err = store
            .update_booking_status(booking.id, BookingStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_event_stats_counts_by_status() {
        let store = MemoryStore::new();
        let event = store.create_event("Stats Night", 10).await.unwrap();

        let b1 = store.commit_booking(event.id, 2).await.unwrap();
        let b2 = store.commit_booking(event.id, 3).await.unwrap();
        store.commit_booking(event.id, 1).await.unwrap();

        store
            .update_booking_status(b1.id, BookingStatus::Finalized)
            .await
            .unwrap();
        store
            .update_booking_status(b2.id, BookingStatus::Failed)
            .await
            .unwrap();

        let stats = store.event_stats(event.id).await.unwrap();
        assert_eq!(stats.total_capacity, 10);
        assert_eq!(stats.available_capacity, 4);
        assert_eq!(stats.booked, 6);
        assert_eq!(stats.finalized, 2);
        assert_eq!(stats.failed, 3);
    }

    #[tokio::test]
    async fn test_overall_report_aggregates_events() {
        let store = MemoryStore::new();
        let a = store.create_event("A", 50).await.unwrap();
        let b = store.create_event("B", 100).await.unwrap();

        let booking = store.commit_booking(a.id, 30).await.unwrap();
        store.commit_booking(b.id, 80).await.unwrap();
        store
            .update_booking_status(booking.id, BookingStatus::Finalized)
            .await
            .unwrap();

        let report = store.overall_report().await.unwrap();
        assert_eq!(report.total_capacity, 150);
        assert_eq!(report.total_reserved, 110);
        assert_eq!(report.total_finalized, 30);
    }

    #[tokio::test]
    async fn test_lock_mutual_exclusion() {
        let lock = MemoryLockClient::new();
        let lease = Duration::from_secs(5);

        let token = lock
            .acquire("event:a", lease, Duration::from_millis(50))
            .await
            .unwrap();

        let err = lock
            .acquire("event:a", lease, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Contended(_)));

        // Different keys are independent.
        lock.acquire("event:b", lease, Duration::from_millis(50))
            .await
            .unwrap();

        lock.release("event:a", &token).await.unwrap();
        lock.acquire("event:a", lease, Duration::from_millis(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_lease_expiry_reclaims() {
        let lock = MemoryLockClient::new();

        // Holder never releases; lease lapses and the key is free again.
        lock.acquire("event:a", Duration::from_millis(40), Duration::from_millis(20))
            .await
            .unwrap();
        lock.acquire("event:a", Duration::from_secs(5), Duration::from_millis(500))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_release_with_stale_token_is_noop() {
        let lock = MemoryLockClient::new();
        let lease = Duration::from_secs(5);

        let first = lock
            .acquire("event:a", lease, Duration::from_millis(50))
            .await
            .unwrap();
        lock.release("event:a", &first).await.unwrap();

        let _second = lock
            .acquire("event:a", lease, Duration::from_millis(50))
            .await
            .unwrap();

        // First holder's token no longer owns the key; releasing with it
        // must not free the second holder's lock.
        lock.release("event:a", &first).await.unwrap();
        let err = lock
            .acquire("event:a", lease, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Contended(_)));
    }

    #[tokio::test]
    async fn test_queue_fifo_and_poll_timeout() {
        let queue = MemoryQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        queue.enqueue(a).await.unwrap();
        queue.enqueue(b).await.unwrap();

        assert_eq!(queue.dequeue(Duration::from_millis(50)).await.unwrap(), Some(a));
        assert_eq!(queue.dequeue(Duration::from_millis(50)).await.unwrap(), Some(b));
        assert_eq!(queue.dequeue(Duration::from_millis(50)).await.unwrap(), None);
    }
}
