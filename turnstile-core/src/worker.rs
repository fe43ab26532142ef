use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{FinalizeError, StoreError};
use crate::model::{Booking, BookingStatus};
use crate::queue::WorkQueue;
use crate::store::InventoryStore;

/// Capability the worker pool depends on to produce the confirmation
/// artifact. The pool never inspects which concrete finalizer is in use.
#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(&self, booking: &Booking) -> Result<(), FinalizeError>;
}

/// Produces a ticket confirmation code for an admitted booking.
///
/// The artifact work itself (PDF, email) sits behind this boundary; the
/// simulated delay stands in for it and is zero in tests.
pub struct ConfirmationFinalizer {
    artifact_delay: Duration,
}

impl ConfirmationFinalizer {
    pub fn new(artifact_delay: Duration) -> Self {
        Self { artifact_delay }
    }

    fn confirmation_code(booking: &Booking) -> String {
        // Format: TKT-{timestamp}-{short_uuid}
        let timestamp = chrono::Utc::now().timestamp();
        let short_id = &booking.id.to_string()[..8];
        format!("TKT-{}-{}", timestamp, short_id.to_uppercase())
    }
}

#[async_trait]
impl Finalizer for ConfirmationFinalizer {
    async fn finalize(&self, booking: &Booking) -> Result<(), FinalizeError> {
        if !self.artifact_delay.is_zero() {
            tokio::time::sleep(self.artifact_delay).await;
        }
        let code = Self::confirmation_code(booking);
        info!(booking_id = %booking.id, %code, "confirmation artifact issued");
        Ok(())
    }
}

/// Retry and polling knobs for finalization workers.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_count: usize,
    /// Total finalization attempts per delivery before marking FAILED.
    pub max_attempts: u32,
    /// Base backoff, doubled per transient failure.
    pub retry_backoff: Duration,
    /// Queue poll window; also the shutdown reaction time.
    pub poll_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Processes one finalization request end to end.
pub struct FinalizationWorker {
    store: Arc<dyn InventoryStore>,
    finalizer: Arc<dyn Finalizer>,
    settings: WorkerSettings,
}

impl FinalizationWorker {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        finalizer: Arc<dyn Finalizer>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            finalizer,
            settings,
        }
    }

    /// Drive a booking to a terminal status.
    ///
    /// Redeliveries of already-terminal bookings are no-ops, which is
    /// what makes the queue's at-least-once delivery safe. Returns the
    /// terminal status reached, or `None` when the booking id is
    /// unknown and the request is dropped.
    pub async fn process(&self, booking_id: Uuid) -> Result<Option<BookingStatus>, StoreError> {
        let booking = match self.store.get_booking(booking_id).await {
            Ok(b) => b,
            Err(StoreError::NotFound(_)) => {
                warn!(%booking_id, "finalization request for unknown booking dropped");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if booking.status.is_terminal() {
            debug!(%booking_id, status = %booking.status, "already terminal, redelivery ignored");
            return Ok(Some(booking.status));
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.finalizer.finalize(&booking).await {
                Ok(()) => {
                    self.store
                        .update_booking_status(booking_id, BookingStatus::Finalized)
                        .await?;
                    info!(%booking_id, attempt, "booking finalized");
                    return Ok(Some(BookingStatus::Finalized));
                }
                Err(FinalizeError::Transient(reason)) if attempt < self.settings.max_attempts => {
                    let backoff = self.settings.retry_backoff * 2u32.saturating_pow(attempt - 1);
                    warn!(%booking_id, attempt, %reason, "transient finalization failure, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!(%booking_id, attempt, error = %e, "finalization failed permanently");
                    self.store
                        .update_booking_status(booking_id, BookingStatus::Failed)
                        .await?;
                    return Ok(Some(BookingStatus::Failed));
                }
            }
        }
    }
}

/// Pool of finalization workers consuming the work queue.
pub struct WorkerPool {
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `settings.worker_count` workers, each polling the queue on
    /// its own task.
    pub fn start(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn InventoryStore>,
        finalizer: Arc<dyn Finalizer>,
        settings: WorkerSettings,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(settings.worker_count);

        for worker_id in 0..settings.worker_count {
            let worker = FinalizationWorker::new(store.clone(), finalizer.clone(), settings.clone());
            let queue = queue.clone();
            let shutdown = shutdown.clone();
            let poll_interval = settings.poll_interval;

            handles.push(tokio::spawn(async move {
                debug!(worker_id, "finalization worker started");
                while !shutdown.load(Ordering::Relaxed) {
                    match queue.dequeue(poll_interval).await {
                        Ok(Some(booking_id)) => {
                            if let Err(e) = worker.process(booking_id).await {
                                error!(worker_id, %booking_id, error = %e, "finalization processing error");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!(worker_id, error = %e, "queue dequeue error");
                            tokio::time::sleep(poll_interval).await;
                        }
                    }
                }
                debug!(worker_id, "finalization worker stopped");
            }));
        }

        Self { shutdown, handles }
    }

    /// Signal workers to stop and wait for them to drain.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
