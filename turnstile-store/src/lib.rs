pub mod app_config;
pub mod database;
pub mod pg_store;
pub mod redis_lock;
pub mod redis_queue;

pub use app_config::Config;
pub use database::DbClient;
pub use pg_store::PgInventoryStore;
pub use redis_lock::RedisLockClient;
pub use redis_queue::RedisWorkQueue;
