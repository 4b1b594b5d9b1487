#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use syncbridge_connectors::{
    Connector, ConnectorCache, ConnectorFactory, ConnectorResult, FetchPage, PushOutcome,
    RejectedRecord,
};
use syncbridge_core::bulk::{BulkOptions, CsvUpload, ImportLimits};
use syncbridge_core::entity::EntityKind;
use syncbridge_core::types::CallerContext;
use syncbridge_db::models::integration::Integration;
use syncbridge_events::EventBus;
use syncbridge_pipeline::{BulkEngine, MemoryStores, Normalizer, SyncJobRunner, SyncOrchestrator};

pub const TENANT: i64 = 1;
pub const USER: i64 = 7;

pub fn caller() -> CallerContext {
    CallerContext::new(USER, TENANT)
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

pub fn bulk_engine() -> (Arc<MemoryStores>, BulkEngine) {
    let stores = Arc::new(MemoryStores::new());
    let engine = BulkEngine::new(
        stores.clone(),
        Arc::new(EventBus::default()),
        ImportLimits::default(),
    );
    (stores, engine)
}

pub fn upload(body: impl Into<String>) -> CsvUpload {
    CsvUpload {
        file_name: "items.csv".to_string(),
        content_type: Some("text/csv".to_string()),
        bytes: body.into().into_bytes(),
    }
}

pub fn options(operation_type: &str, entity_type: &str) -> BulkOptions {
    BulkOptions {
        operation_type: operation_type.to_string(),
        entity_type: entity_type.to_string(),
        ..Default::default()
    }
}

/// Product CSV with `rows` rows; row `bad_row` (1-based) gets a
/// non-numeric price.
pub fn products_csv(rows: usize, bad_row: Option<usize>) -> String {
    let mut csv = String::from("sku,name,price\n");
    for i in 1..=rows {
        let price = if Some(i) == bad_row {
            "not-a-price".to_string()
        } else {
            format!("{i}.50")
        };
        csv.push_str(&format!("SKU-{i:03},Product {i},{price}\n"));
    }
    csv
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Connector serving canned pages and recording pushed batches.
pub struct FakeConnector {
    pub pages: Vec<FetchPage>,
    pub pushed: Mutex<Vec<Vec<Value>>>,
    /// Batch positions reported as rejected on every push.
    pub reject: Vec<usize>,
}

impl FakeConnector {
    pub fn new(pages: Vec<FetchPage>) -> Self {
        Self {
            pages,
            pushed: Mutex::new(Vec::new()),
            reject: Vec::new(),
        }
    }

    pub fn pushed(&self) -> Vec<Vec<Value>> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn system(&self) -> &str {
        "shopify"
    }

    async fn test_connection(&self) -> ConnectorResult<()> {
        Ok(())
    }

    async fn fetch_entities(&self, _entity: EntityKind, cursor: Option<&str>) -> ConnectorResult<FetchPage> {
        let index: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn push_entities(&self, _entity: EntityKind, batch: &[Value]) -> ConnectorResult<PushOutcome> {
        self.pushed.lock().unwrap().push(batch.to_vec());
        let rejected: Vec<RejectedRecord> = self
            .reject
            .iter()
            .filter(|i| **i < batch.len())
            .map(|i| RejectedRecord {
                index: *i,
                error: "duplicate handle".to_string(),
            })
            .collect();
        Ok(PushOutcome {
            accepted: batch.len() - rejected.len(),
            rejected,
        })
    }
}

pub struct FakeFactory(pub Arc<FakeConnector>);

impl ConnectorFactory for FakeFactory {
    fn create(&self, _integration: &Integration) -> ConnectorResult<Arc<dyn Connector>> {
        Ok(self.0.clone())
    }
}

pub struct SyncHarness {
    pub stores: Arc<MemoryStores>,
    pub events: Arc<EventBus>,
    pub orchestrator: SyncOrchestrator,
    pub runner: SyncJobRunner,
    pub connector: Arc<FakeConnector>,
    pub integration: Integration,
}

pub fn sync_harness(connector: FakeConnector) -> SyncHarness {
    let stores = Arc::new(MemoryStores::new());
    let events = Arc::new(EventBus::default());
    let connector = Arc::new(connector);
    let integration = stores.add_integration(TENANT, "shopify", json!({}));

    let cache = Arc::new(ConnectorCache::new(
        Arc::new(FakeFactory(connector.clone())),
        Duration::from_secs(300),
    ));
    let normalizer = Arc::new(Normalizer::with_defaults().unwrap());

    SyncHarness {
        orchestrator: SyncOrchestrator::new(stores.clone(), stores.clone(), events.clone()),
        runner: SyncJobRunner::new(stores.clone(), cache, normalizer, events.clone(), 2),
        stores,
        events,
        connector,
        integration,
    }
}

/// A Shopify product payload.
pub fn shopify_product(id: i64, sku: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Product {id}"),
        "status": "active",
        "variants": [{"sku": sku, "price": "19.99"}],
        "updated_at": "2024-05-01T10:00:00Z"
    })
}

pub fn page(records: Vec<Value>, next_cursor: Option<&str>) -> FetchPage {
    FetchPage {
        records,
        next_cursor: next_cursor.map(str::to_string),
    }
}
