use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::queue::WorkQueue;
use crate::store::InventoryStore;

/// Timing knobs for the PENDING-booking reconciliation sweep.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// How old a PENDING booking must be before it is considered stuck.
    /// Must exceed the normal enqueue-to-finalize latency, or healthy
    /// bookings get double-enqueued (harmless, but noisy).
    pub pending_grace: Duration,
    pub sweep_interval: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            pending_grace: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Periodically re-enqueues PENDING bookings whose finalization request
/// was lost, typically because the queue was unavailable right after
/// the admission commit. Safe to run alongside live traffic: workers
/// treat redelivered terminal bookings as no-ops.
pub struct ReconciliationSweep {
    store: Arc<dyn InventoryStore>,
    queue: Arc<dyn WorkQueue>,
    settings: ReconcileSettings,
}

impl ReconciliationSweep {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        queue: Arc<dyn WorkQueue>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            queue,
            settings,
        }
    }

    /// Run a single sweep; returns how many bookings were re-enqueued.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let grace = chrono::Duration::from_std(self.settings.pending_grace)
            .map_err(|e| StoreError::Backend(format!("invalid grace period: {}", e)))?;
        let cutoff = chrono::Utc::now() - grace;

        let stale = self.store.pending_bookings_older_than(cutoff).await?;
        let mut requeued = 0;
        for booking in &stale {
            match self.queue.enqueue(booking.id).await {
                Ok(()) => requeued += 1,
                Err(e) => {
                    // Still down; the next sweep gets another shot.
                    warn!(booking_id = %booking.id, error = %e, "reconciliation enqueue failed");
                }
            }
        }

        if requeued > 0 {
            info!(requeued, "reconciliation sweep re-enqueued stuck bookings");
        }
        Ok(requeued)
    }

    /// Spawn the sweep loop on its own task.
    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !shutdown.load(Ordering::Relaxed) {
                tokio::time::sleep(self.settings.sweep_interval).await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = self.sweep_once().await {
                    error!(error = %e, "reconciliation sweep failed");
                }
            }
        })
    }
}
