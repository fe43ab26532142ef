use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;

use turnstile_core::error::QueueError;
use turnstile_core::queue::WorkQueue;

/// Redis list as a finalization broker: LPUSH to produce, BRPOP to
/// consume. Best-effort FIFO, at-least-once once the reconciliation
/// sweep is in play.
#[derive(Clone)]
pub struct RedisWorkQueue {
    client: redis::Client,
    key: String,
}

const DEFAULT_QUEUE_KEY: &str = "finalize:queue";

fn unavailable(e: redis::RedisError) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

impl RedisWorkQueue {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            key: DEFAULT_QUEUE_KEY.to_string(),
        })
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, booking_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;

        conn.lpush::<_, _, ()>(&self.key, booking_id.to_string())
            .await
            .map_err(unavailable)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Uuid>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;

        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(wait.as_secs_f64())
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        match reply {
            None => Ok(None),
            Some((_, payload)) => match Uuid::parse_str(&payload) {
                Ok(id) => Ok(Some(id)),
                Err(_) => {
                    // Poison entry; drop it rather than wedge the worker.
                    warn!(%payload, "discarding malformed queue entry");
                    Ok(None)
                }
            },
        }
    }
}
