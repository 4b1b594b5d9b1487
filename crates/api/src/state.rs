use std::sync::Arc;

use syncbridge_connectors::{ConnectorCache, ConnectorFactory};
use syncbridge_db::DbPool;
use syncbridge_events::EventBus;
use syncbridge_pipeline::{
    BulkEngine, BulkStore, CanonicalStore, SyncJobStore, SyncOrchestrator, SyncQueue,
};

use crate::config::ServerConfig;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Present in production; absent when the state is built over in-memory
    /// stores.
    pub pool: Option<DbPool>,
    /// Integration lookups for endpoints that act on an integration directly.
    pub integrations: Arc<dyn SyncJobStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub bulk: BulkEngine,
    pub connectors: Arc<ConnectorCache>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    pub fn new<S>(
        stores: Arc<S>,
        factory: Arc<dyn ConnectorFactory>,
        event_bus: Arc<EventBus>,
        config: ServerConfig,
    ) -> Self
    where
        S: SyncJobStore + SyncQueue + BulkStore + CanonicalStore + 'static,
    {
        let orchestrator = SyncOrchestrator::new(stores.clone(), stores.clone(), Arc::clone(&event_bus));
        let bulk = BulkEngine::new(
            stores.clone(),
            Arc::clone(&event_bus),
            config.pipeline.import_limits,
        );
        let connectors = Arc::new(ConnectorCache::new(factory, config.pipeline.connector_cache_ttl));

        Self {
            config: Arc::new(config),
            pool: None,
            integrations: stores,
            orchestrator: Arc::new(orchestrator),
            bulk,
            connectors,
            event_bus,
        }
    }

    pub fn with_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }
}
