use std::sync::Arc;
use std::time::Duration;

use syncbridge_connectors::RestConnectorFactory;
use syncbridge_events::{EventBus, EventLogger};
use syncbridge_pipeline::PgStores;
use syncbridge_worker::{Worker, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncbridge_worker=debug,syncbridge_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        max_concurrent_jobs = config.pipeline.max_concurrent_jobs,
        "Loaded worker configuration",
    );

    let pool = syncbridge_db::create_pool(&config.database_url).await?;
    syncbridge_db::health_check(&pool).await?;
    syncbridge_db::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

    let worker = Worker::new(
        Arc::new(PgStores::new(pool)),
        Arc::new(RestConnectorFactory::new()),
        Arc::clone(&event_bus),
        &config.pipeline,
    )?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, draining in-flight jobs");
        signal_cancel.cancel();
    });

    worker.run(cancel).await;

    drop(worker);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
