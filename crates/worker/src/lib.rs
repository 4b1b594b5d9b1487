//! Sync queue worker.
//!
//! A [`Worker`] owns one [`SyncJobRunner`] plus the connector cache it
//! executes against. [`Worker::run`] drains the queue until cancelled and
//! periodically evicts expired connectors from the cache.

use std::sync::Arc;
use std::time::Duration;

use syncbridge_connectors::{ConnectorCache, ConnectorFactory};
use syncbridge_core::error::CoreResult;
use syncbridge_events::EventBus;
use syncbridge_pipeline::{CanonicalStore, Normalizer, PipelineConfig, SyncJobRunner, SyncJobStore, SyncQueue};
use tokio_util::sync::CancellationToken;

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub pipeline: PipelineConfig,
}

impl WorkerConfig {
    /// Load from the environment. `DATABASE_URL` is required; the pipeline
    /// knobs are documented on [`PipelineConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

pub struct Worker {
    runner: SyncJobRunner,
    connectors: Arc<ConnectorCache>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new<S>(
        stores: Arc<S>,
        factory: Arc<dyn ConnectorFactory>,
        events: Arc<EventBus>,
        config: &PipelineConfig,
    ) -> CoreResult<Self>
    where
        S: SyncJobStore + SyncQueue + CanonicalStore + 'static,
    {
        let connectors = Arc::new(ConnectorCache::new(factory, config.connector_cache_ttl));
        let normalizer = Arc::new(Normalizer::with_defaults()?);
        let runner = SyncJobRunner::new(
            stores,
            Arc::clone(&connectors),
            normalizer,
            events,
            config.max_concurrent_jobs,
        );
        Ok(Self {
            runner,
            connectors,
            poll_interval: config.poll_interval,
        })
    }

    pub fn runner(&self) -> &SyncJobRunner {
        &self.runner
    }

    pub fn connectors(&self) -> &Arc<ConnectorCache> {
        &self.connectors
    }

    /// Run until `cancel` fires. In-flight jobs finish before this returns.
    pub async fn run(&self, cancel: CancellationToken) {
        tokio::join!(
            self.runner.run(self.poll_interval, cancel.clone()),
            sweep_connectors(Arc::clone(&self.connectors), cancel),
        );
    }
}

/// Evict expired connectors once per TTL.
async fn sweep_connectors(connectors: Arc<ConnectorCache>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(connectors.ttl());
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = connectors.purge_expired().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Expired connectors evicted");
                }
            }
        }
    }
}
