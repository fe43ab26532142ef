pub mod admission;
pub mod error;
pub mod lock;
pub mod memory;
pub mod model;
pub mod queue;
pub mod reconcile;
pub mod store;
pub mod worker;

pub use admission::{AdmissionService, AdmissionSettings};
pub use error::{AdmissionError, FinalizeError, LockError, QueueError, StoreError};
pub use lock::{LockClient, LockToken};
pub use model::{Booking, BookingStatus, Event, EventStats, OverallReport};
pub use queue::WorkQueue;
pub use reconcile::{ReconcileSettings, ReconciliationSweep};
pub use store::InventoryStore;
pub use worker::{ConfirmationFinalizer, FinalizationWorker, Finalizer, WorkerPool, WorkerSettings};
