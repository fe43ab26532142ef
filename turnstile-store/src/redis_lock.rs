use std::time::{Duration, Instant};

use async_trait::async_trait;

use turnstile_core::error::LockError;
use turnstile_core::lock::{LockClient, LockToken};

/// Redis-backed distributed lock.
///
/// Acquisition is `SET key token NX PX lease`, polled until the bounded
/// wait runs out. Release goes through a Lua script that deletes the key
/// only while our token still owns it, so a holder whose lease lapsed
/// cannot stomp on a successor.
#[derive(Clone)]
pub struct RedisLockClient {
    client: redis::Client,
    retry_interval: Duration,
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

fn backend(e: redis::RedisError) -> LockError {
    LockError::Backend(e.to_string())
}

impl RedisLockClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            retry_interval: Duration::from_millis(100),
        })
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

#[async_trait]
impl LockClient for RedisLockClient {
    async fn acquire(
        &self,
        key: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<LockToken, LockError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;

        let token = LockToken::generate();
        let deadline = Instant::now() + wait;

        loop {
            // SET NX: only the first writer per lease window wins.
            let acquired: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(token.as_str())
                .arg("NX")
                .arg("PX")
                .arg(lease.as_millis() as u64)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            if acquired.is_some() {
                return Ok(token);
            }
            if Instant::now() >= deadline {
                return Err(LockError::Contended(key.to_string()));
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;

        let script = redis::Script::new(RELEASE_SCRIPT);
        // 0 means the token no longer owned the key; that is fine.
        let _deleted: i32 = script
            .key(key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        Ok(())
    }
}
