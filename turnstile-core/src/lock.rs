use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LockError;

/// Opaque ownership token handed out on acquisition.
///
/// Release is only honored for the token that currently holds the lock,
/// so a holder whose lease already expired cannot release a successor's
/// lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Mutual-exclusion lock client, one exclusive lock per key.
///
/// No reentrancy, no read/write distinction. The lease bounds how long a
/// crashed holder can block others: once it lapses the key is up for
/// grabs again without any release call.
#[async_trait]
pub trait LockClient: Send + Sync {
    /// Try to take the lock, polling until `wait` has elapsed.
    /// `LockError::Contended` when somebody else held it the whole time.
    async fn acquire(
        &self,
        key: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<LockToken, LockError>;

    /// Release the lock if `token` still owns it. Releasing with a stale
    /// or mismatched token is a no-op, never an error.
    async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError>;
}
