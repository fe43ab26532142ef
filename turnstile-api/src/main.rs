use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_api::{app, AppState};
use turnstile_core::{AdmissionService, ConfirmationFinalizer, ReconciliationSweep, WorkerPool};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = turnstile_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Turnstile API on port {}", config.server.port);

    // Postgres
    let db = turnstile_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let store = Arc::new(turnstile_store::PgInventoryStore::new(db.pool.clone()));

    // Redis: per-event admission locks plus the finalization broker
    let lock = Arc::new(
        turnstile_store::RedisLockClient::new(&config.redis.url)
            .expect("Failed to create Redis lock client"),
    );
    let queue = Arc::new(
        turnstile_store::RedisWorkQueue::new(&config.redis.url)
            .expect("Failed to create Redis work queue"),
    );

    let admission = Arc::new(AdmissionService::new(
        store.clone(),
        lock,
        queue.clone(),
        config.admission.settings(),
    ));

    // Finalization workers and the PENDING-booking sweep run for the
    // lifetime of the process.
    let finalizer = Arc::new(ConfirmationFinalizer::new(config.worker.artifact_delay()));
    let _worker_pool = WorkerPool::start(
        queue.clone(),
        store.clone(),
        finalizer,
        config.worker.settings(),
    );
    let _sweep_handle =
        ReconciliationSweep::new(store.clone(), queue.clone(), config.reconcile.settings())
            .spawn(Arc::new(AtomicBool::new(false)));

    let app = app(AppState { admission });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
