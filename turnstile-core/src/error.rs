use thiserror::Error;

/// Errors surfaced by the inventory store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The conditional capacity decrement found less inventory than
    /// requested, or a terminal booking status was asked to change.
    #[error("conflicting update rejected by the store")]
    Conflict,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the distributed lock client.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock contended: {0}")]
    Contended(String),

    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the finalization work queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("queue closed")]
    Closed,
}

/// Outcome of a single finalization attempt.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Worth retrying with backoff.
    #[error("transient finalization failure: {0}")]
    Transient(String),

    /// Retrying cannot help; the booking is marked FAILED.
    #[error("permanent finalization failure: {0}")]
    Permanent(String),
}

/// Admission-time errors returned synchronously to callers.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The per-event lock could not be acquired within the bounded wait.
    /// Retryable by the caller with backoff.
    #[error("could not acquire booking lock, please try again")]
    LockContention,

    /// Business rejection; not retryable without new capacity.
    #[error("insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: i32, available: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
