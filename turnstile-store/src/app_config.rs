use std::env;
use std::time::Duration;

use serde::Deserialize;
use turnstile_core::admission::AdmissionSettings;
use turnstile_core::reconcile::ReconcileSettings;
use turnstile_core::worker::WorkerSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    /// Bounded wait for the per-event lock.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
    /// Lease on the lock; must outlast the worst-case critical section.
    #[serde(default = "default_lock_lease_ms")]
    pub lock_lease_ms: u64,
}

fn default_lock_wait_ms() -> u64 {
    5_000
}

fn default_lock_lease_ms() -> u64 {
    10_000
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: default_lock_wait_ms(),
            lock_lease_ms: default_lock_lease_ms(),
        }
    }
}

impl AdmissionConfig {
    pub fn settings(&self) -> AdmissionSettings {
        AdmissionSettings {
            lock_wait: Duration::from_millis(self.lock_wait_ms),
            lock_lease: Duration::from_millis(self.lock_lease_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Simulated confirmation-artifact latency (PDF/email issuance).
    #[serde(default)]
    pub artifact_delay_ms: u64,
}

fn default_worker_count() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            artifact_delay_ms: 0,
        }
    }
}

impl WorkerConfig {
    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            worker_count: self.count,
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn artifact_delay(&self) -> Duration {
        Duration::from_millis(self.artifact_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    #[serde(default = "default_pending_grace_seconds")]
    pub pending_grace_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_pending_grace_seconds() -> u64 {
    60
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            pending_grace_seconds: default_pending_grace_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl ReconcileConfig {
    pub fn settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            pending_grace: Duration::from_secs(self.pending_grace_seconds),
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables with a TURNSTILE prefix,
            // e.g. TURNSTILE__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("TURNSTILE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_convert_to_settings() {
        let admission = AdmissionConfig::default();
        let settings = admission.settings();
        assert_eq!(settings.lock_wait, Duration::from_secs(5));
        assert_eq!(settings.lock_lease, Duration::from_secs(10));

        let worker = WorkerConfig::default();
        assert_eq!(worker.settings().worker_count, 4);
        assert_eq!(worker.artifact_delay(), Duration::ZERO);

        let reconcile = ReconcileConfig::default().settings();
        assert!(reconcile.pending_grace > reconcile.sweep_interval);
    }
}
