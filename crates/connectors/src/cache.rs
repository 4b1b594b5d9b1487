//! Per-integration connector cache.
//!
//! A miss builds a connector through the [`ConnectorFactory`] and proves it
//! with `test_connection` before caching. Entries expire after the TTL, when
//! the integration row's `updated_at` moves, or on explicit
//! [`invalidate`](ConnectorCache::invalidate).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use syncbridge_core::types::{DbId, Timestamp};
use syncbridge_db::models::integration::Integration;
use tokio::sync::RwLock;

use crate::connector::Connector;
use crate::error::ConnectorResult;
use crate::factory::ConnectorFactory;
use crate::retry::{with_retry, RetryConfig};

/// Default time a handshaken connector stays cached.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CachedConnector {
    connector: Arc<dyn Connector>,
    cached_at: Instant,
    /// `integrations.updated_at` when the connector was built.
    config_version: Timestamp,
}

impl CachedConnector {
    fn is_fresh(&self, ttl: Duration, integration: &Integration) -> bool {
        self.cached_at.elapsed() < ttl && self.config_version == integration.updated_at
    }
}

pub struct ConnectorCache {
    factory: Arc<dyn ConnectorFactory>,
    ttl: Duration,
    retry: RetryConfig,
    entries: RwLock<HashMap<DbId, CachedConnector>>,
}

impl ConnectorCache {
    pub fn new(factory: Arc<dyn ConnectorFactory>, ttl: Duration) -> Self {
        Self {
            factory,
            ttl,
            retry: RetryConfig::default(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a live connector for `integration`, handshaking on a miss.
    pub async fn get(&self, integration: &Integration) -> ConnectorResult<Arc<dyn Connector>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&integration.id) {
                if entry.is_fresh(self.ttl, integration) {
                    return Ok(Arc::clone(&entry.connector));
                }
            }
        }

        let connector = self.factory.create(integration)?;
        with_retry(&self.retry, "Connector handshake", || connector.test_connection()).await?;

        tracing::info!(
            integration_id = integration.id,
            system = %integration.system,
            ttl_secs = self.ttl.as_secs(),
            "Connector cached",
        );

        self.entries.write().await.insert(
            integration.id,
            CachedConnector {
                connector: Arc::clone(&connector),
                cached_at: Instant::now(),
                config_version: integration.updated_at,
            },
        );
        Ok(connector)
    }

    /// Drop the cached connector for an integration, e.g. after its
    /// configuration changed. Returns whether an entry was present.
    pub async fn invalidate(&self, integration_id: DbId) -> bool {
        let removed = self.entries.write().await.remove(&integration_id).is_some();
        if removed {
            tracing::info!(integration_id, "Connector cache entry invalidated");
        }
        removed
    }

    /// Remove entries older than the TTL. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{FetchPage, PushOutcome};
    use crate::error::ConnectorError;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use syncbridge_core::entity::EntityKind;

    struct FakeConnector {
        handshakes: Arc<AtomicUsize>,
        healthy: bool,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        fn system(&self) -> &str {
            "netsuite"
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                Err(ConnectorError::Protocol("handshake rejected".into()))
            }
        }

        async fn fetch_entities(&self, _: EntityKind, _: Option<&str>) -> ConnectorResult<FetchPage> {
            Ok(FetchPage::default())
        }

        async fn push_entities(&self, _: EntityKind, batch: &[Value]) -> ConnectorResult<PushOutcome> {
            Ok(PushOutcome {
                accepted: batch.len(),
                rejected: Vec::new(),
            })
        }
    }

    struct FakeFactory {
        created: AtomicUsize,
        handshakes: Arc<AtomicUsize>,
        healthy: bool,
    }

    impl FakeFactory {
        fn new(healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                created: AtomicUsize::new(0),
                handshakes: Arc::new(AtomicUsize::new(0)),
                healthy,
            })
        }
    }

    impl ConnectorFactory for FakeFactory {
        fn create(&self, _: &Integration) -> ConnectorResult<Arc<dyn Connector>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeConnector {
                handshakes: Arc::clone(&self.handshakes),
                healthy: self.healthy,
            }))
        }
    }

    fn integration(id: DbId) -> Integration {
        Integration {
            id,
            tenant_id: 1,
            system: "netsuite".into(),
            name: "ERP".into(),
            config: json!({"base_url": "https://erp.test"}),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn hit_reuses_connector_without_handshake() {
        let factory = FakeFactory::new(true);
        let cache = ConnectorCache::new(factory.clone(), DEFAULT_TTL);
        let row = integration(1);

        cache.get(&row).await.unwrap();
        cache.get(&row).await.unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.handshakes.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_rebuilt() {
        let factory = FakeFactory::new(true);
        let cache = ConnectorCache::new(factory.clone(), Duration::ZERO);
        let row = integration(1);

        cache.get(&row).await.unwrap();
        cache.get(&row).await.unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn changed_integration_is_stale() {
        let factory = FakeFactory::new(true);
        let cache = ConnectorCache::new(factory.clone(), DEFAULT_TTL);
        let mut row = integration(1);

        cache.get(&row).await.unwrap();
        row.updated_at += chrono::Duration::seconds(1);
        cache.get(&row).await.unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_new_handshake() {
        let factory = FakeFactory::new(true);
        let cache = ConnectorCache::new(factory.clone(), DEFAULT_TTL);
        let row = integration(5);

        cache.get(&row).await.unwrap();
        assert!(cache.invalidate(5).await);
        assert!(!cache.invalidate(5).await);
        cache.get(&row).await.unwrap();

        assert_eq!(factory.handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_handshake_is_not_cached() {
        let factory = FakeFactory::new(false);
        let cache = ConnectorCache::new(factory.clone(), DEFAULT_TTL);

        let result = cache.get(&integration(2)).await;
        assert!(matches!(result, Err(ConnectorError::Protocol(_))));
        assert!(cache.is_empty().await);
    }
}
