use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AdmissionError, LockError, StoreError};
use crate::lock::LockClient;
use crate::model::{Booking, Event, EventStats, OverallReport};
use crate::queue::WorkQueue;
use crate::store::InventoryStore;

/// Lock timing knobs for the admission critical section.
///
/// The lease must comfortably cover the capacity re-read plus the
/// booking commit; the defaults mirror a 5s bounded wait against a 10s
/// lease.
#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub lock_wait: Duration,
    pub lock_lease: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(5),
            lock_lease: Duration::from_secs(10),
        }
    }
}

/// Orchestrates ticket admission: per-event mutual exclusion, capacity
/// re-check, atomic reservation, and hand-off to the finalization queue.
pub struct AdmissionService {
    store: Arc<dyn InventoryStore>,
    lock: Arc<dyn LockClient>,
    queue: Arc<dyn WorkQueue>,
    settings: AdmissionSettings,
}

fn lock_key(event_id: Uuid) -> String {
    format!("event_lock:{}", event_id)
}

impl AdmissionService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        lock: Arc<dyn LockClient>,
        queue: Arc<dyn WorkQueue>,
        settings: AdmissionSettings,
    ) -> Self {
        Self {
            store,
            lock,
            queue,
            settings,
        }
    }

    pub async fn create_event(
        &self,
        name: &str,
        total_capacity: i32,
    ) -> Result<Event, AdmissionError> {
        if name.trim().is_empty() {
            return Err(AdmissionError::InvalidRequest(
                "event name must not be empty".to_string(),
            ));
        }
        if total_capacity < 0 {
            return Err(AdmissionError::InvalidRequest(
                "capacity must not be negative".to_string(),
            ));
        }

        let event = self.store.create_event(name, total_capacity).await?;
        info!(event_id = %event.id, capacity = total_capacity, "event created");
        Ok(event)
    }

    pub async fn get_event(&self, event_id: Uuid) -> Result<Event, AdmissionError> {
        self.store.get_event(event_id).await.map_err(not_found_or_store)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, AdmissionError> {
        self.store
            .get_booking(booking_id)
            .await
            .map_err(not_found_or_store)
    }

    pub async fn event_stats(&self, event_id: Uuid) -> Result<EventStats, AdmissionError> {
        self.store
            .event_stats(event_id)
            .await
            .map_err(not_found_or_store)
    }

    pub async fn overall_report(&self) -> Result<OverallReport, AdmissionError> {
        Ok(self.store.overall_report().await?)
    }

    /// Admit a booking: reserve inventory and create the PENDING record.
    ///
    /// Serialized per event by the distributed lock; requests for other
    /// events proceed in parallel. On success the reservation is already
    /// durable; finalization happens out of band.
    pub async fn create_booking(
        &self,
        event_id: Uuid,
        quantity: i32,
    ) -> Result<Booking, AdmissionError> {
        if quantity <= 0 {
            return Err(AdmissionError::InvalidRequest(
                "quantity must be positive".to_string(),
            ));
        }

        let key = lock_key(event_id);
        let token = self
            .lock
            .acquire(&key, self.settings.lock_lease, self.settings.lock_wait)
            .await
            .map_err(|e| match e {
                LockError::Contended(_) => AdmissionError::LockContention,
                LockError::Backend(msg) => StoreError::Backend(msg).into(),
            })?;

        // The commit is the last lock-protected action; release happens
        // immediately after, whether admission succeeded or not.
        let admitted = self.admit_under_lock(event_id, quantity).await;

        if let Err(e) = self.lock.release(&key, &token).await {
            warn!(%event_id, error = %e, "failed to release admission lock, lease will expire it");
        }

        let booking = admitted?;

        // The reservation is committed; a queue outage must not undo it.
        // The booking stays PENDING and the reconciliation sweep will
        // re-enqueue it.
        if let Err(e) = self.queue.enqueue(booking.id).await {
            warn!(
                booking_id = %booking.id,
                error = %e,
                "finalization enqueue failed after commit, booking left PENDING"
            );
        }

        info!(booking_id = %booking.id, %event_id, quantity, "booking admitted");
        Ok(booking)
    }

    async fn admit_under_lock(
        &self,
        event_id: Uuid,
        quantity: i32,
    ) -> Result<Booking, AdmissionError> {
        // Re-read under the lock; the lock is the sole mutual exclusion,
        // so this observes the latest committed capacity.
        let event = self
            .store
            .get_event(event_id)
            .await
            .map_err(not_found_or_store)?;

        if event.available_capacity < quantity {
            return Err(AdmissionError::InsufficientCapacity {
                requested: quantity,
                available: event.available_capacity,
            });
        }

        match self.store.commit_booking(event_id, quantity).await {
            Ok(booking) => Ok(booking),
            // The store's conditional decrement tripped despite the lock.
            // To the caller this is the same business rejection.
            Err(StoreError::Conflict) => Err(AdmissionError::InsufficientCapacity {
                requested: quantity,
                available: event.available_capacity,
            }),
            Err(e) => Err(not_found_or_store(e)),
        }
    }
}

fn not_found_or_store(e: StoreError) -> AdmissionError {
    match e {
        StoreError::NotFound(what) => AdmissionError::NotFound(what),
        other => AdmissionError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::error::QueueError;
    use crate::memory::{MemoryLockClient, MemoryQueue, MemoryStore};
    use crate::model::BookingStatus;

    fn service_with(store: Arc<dyn InventoryStore>, queue: Arc<dyn WorkQueue>) -> AdmissionService {
        AdmissionService::new(
            store,
            Arc::new(MemoryLockClient::new()),
            queue,
            AdmissionSettings::default(),
        )
    }

    fn service() -> AdmissionService {
        service_with(Arc::new(MemoryStore::new()), Arc::new(MemoryQueue::new()))
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let svc = service();
        let event = svc.create_event("Gig", 10).await.unwrap();

        let err = svc.create_booking(event.id, 0).await.unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidRequest(_)));
        let err = svc.create_booking(event.id, -3).await.unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rejects_blank_event_name() {
        let svc = service();
        let err = svc.create_event("   ", 10).await.unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let svc = service();
        let err = svc.create_booking(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_event_and_booking_lookup() {
        let svc = service();
        let event = svc.create_event("Lookup", 4).await.unwrap();
        let booking = svc.create_booking(event.id, 1).await.unwrap();

        assert_eq!(svc.get_event(event.id).await.unwrap().id, event.id);
        assert_eq!(svc.get_booking(booking.id).await.unwrap().id, booking.id);

        let err = svc.get_event(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
        let err = svc.get_booking(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sequential_fill_then_sold_out() {
        let svc = service();
        let event = svc.create_event("Sellout Show", 10).await.unwrap();

        for _ in 0..10 {
            let booking = svc.create_booking(event.id, 1).await.unwrap();
            assert_eq!(booking.status, BookingStatus::Pending);
        }

        let err = svc.create_booking(event.id, 1).await.unwrap_err();
        assert!(matches!(err, AdmissionError::InsufficientCapacity { .. }));

        let stats = svc.event_stats(event.id).await.unwrap();
        assert_eq!(stats.available_capacity, 0);
        assert_eq!(stats.booked, 10);
    }

    #[tokio::test]
    async fn test_admission_is_durable_before_return() {
        let store = Arc::new(MemoryStore::new());
        let svc = service_with(store.clone(), Arc::new(MemoryQueue::new()));
        let event = svc.create_event("Durable", 5).await.unwrap();

        let booking = svc.create_booking(event.id, 2).await.unwrap();

        // The reservation is already reflected in the store.
        assert_eq!(store.get_event(event.id).await.unwrap().available_capacity, 3);
        assert_eq!(
            store.get_booking(booking.id).await.unwrap().status,
            BookingStatus::Pending
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_oversell_under_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let svc = Arc::new(service_with(store.clone(), Arc::new(MemoryQueue::new())));
        let event = svc.create_event("Last Ticket", 1).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let svc = svc.clone();
            let event_id = event.id;
            handles.push(tokio::spawn(
                async move { svc.create_booking(event_id, 1).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AdmissionError::InsufficientCapacity { .. })
                | Err(AdmissionError::LockContention) => {}
                Err(other) => panic!("unexpected admission error: {}", other),
            }
        }

        assert_eq!(successes, 1);
        let stats = svc.event_stats(event.id).await.unwrap();
        assert_eq!(stats.booked, 1);
        assert_eq!(stats.available_capacity, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_oversell_with_mixed_quantities() {
        let store = Arc::new(MemoryStore::new());
        let svc = Arc::new(service_with(store.clone(), Arc::new(MemoryQueue::new())));
        let event = svc.create_event("Mixed Load", 20).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..12 {
            let svc = svc.clone();
            let event_id = event.id;
            let quantity = (i % 3) + 1;
            handles.push(tokio::spawn(async move {
                svc.create_booking(event_id, quantity).await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let stats = svc.event_stats(event.id).await.unwrap();
        assert!(stats.booked <= stats.total_capacity);
        assert!(stats.available_capacity >= 0);
        assert_eq!(stats.booked + stats.available_capacity, stats.total_capacity);
    }

    struct FailingQueue;

    #[async_trait]
    impl WorkQueue for FailingQueue {
        async fn enqueue(&self, _booking_id: Uuid) -> Result<(), QueueError> {
            Err(QueueError::Unavailable("broker down".to_string()))
        }

        async fn dequeue(&self, _wait: Duration) -> Result<Option<Uuid>, QueueError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_enqueue_failure_keeps_committed_booking() {
        let store = Arc::new(MemoryStore::new());
        let svc = service_with(store.clone(), Arc::new(FailingQueue));
        let event = svc.create_event("Broker Down", 3).await.unwrap();

        // Admission still succeeds; the booking stays PENDING for the
        // reconciliation sweep.
        let booking = svc.create_booking(event.id, 1).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(store.get_event(event.id).await.unwrap().available_capacity, 2);
    }

    /// Store double whose conditional decrement always trips, as if a
    /// competing writer got there between the re-read and the commit.
    struct ConflictingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl InventoryStore for ConflictingStore {
        async fn create_event(&self, name: &str, cap: i32) -> Result<Event, StoreError> {
            self.inner.create_event(name, cap).await
        }
        async fn get_event(&self, id: Uuid) -> Result<Event, StoreError> {
            self.inner.get_event(id).await
        }
        async fn commit_booking(&self, _event_id: Uuid, _quantity: i32) -> Result<Booking, StoreError> {
            Err(StoreError::Conflict)
        }
        async fn update_booking_status(
            &self,
            id: Uuid,
            status: BookingStatus,
        ) -> Result<(), StoreError> {
            self.inner.update_booking_status(id, status).await
        }
        async fn get_booking(&self, id: Uuid) -> Result<Booking, StoreError> {
            self.inner.get_booking(id).await
        }
        async fn pending_bookings_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Booking>, StoreError> {
            self.inner.pending_bookings_older_than(cutoff).await
        }
        async fn event_stats(&self, id: Uuid) -> Result<EventStats, StoreError> {
            self.inner.event_stats(id).await
        }
        async fn overall_report(&self) -> Result<OverallReport, StoreError> {
            self.inner.overall_report().await
        }
    }

    #[tokio::test]
    async fn test_store_conflict_reads_as_insufficient_capacity() {
        let store = Arc::new(ConflictingStore {
            inner: MemoryStore::new(),
        });
        let svc = service_with(store, Arc::new(MemoryQueue::new()));
        let event = svc.create_event("Raced", 5).await.unwrap();

        let err = svc.create_booking(event.id, 1).await.unwrap_err();
        assert!(matches!(err, AdmissionError::InsufficientCapacity { .. }));
    }

    #[tokio::test]
    async fn test_lock_contention_when_lock_is_held() {
        let store = Arc::new(MemoryStore::new());
        let lock = Arc::new(MemoryLockClient::new());
        let svc = AdmissionService::new(
            store,
            lock.clone(),
            Arc::new(MemoryQueue::new()),
            AdmissionSettings {
                lock_wait: Duration::from_millis(50),
                lock_lease: Duration::from_secs(5),
            },
        );
        let event = svc.create_event("Held", 5).await.unwrap();

        // Park a foreign holder on the event's lock.
        let _token = lock
            .acquire(
                &super::lock_key(event.id),
                Duration::from_secs(5),
                Duration::from_millis(50),
            )
            .await
            .unwrap();

        let err = svc.create_booking(event.id, 1).await.unwrap_err();
        assert!(matches!(err, AdmissionError::LockContention));
    }
}
