//! The capability an external system exposes to the sync runner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use syncbridge_core::entity::EntityKind;

use crate::error::ConnectorResult;

/// One page of records fetched from an external system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchPage {
    /// Records in the external system's own shape.
    #[serde(default)]
    pub records: Vec<Value>,
    /// Opaque cursor for the next page; `None` on the last page.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A record the external system refused during a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position of the record within the pushed batch.
    pub index: usize,
    pub error: String,
}

/// Result of pushing one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushOutcome {
    #[serde(default)]
    pub accepted: usize,
    #[serde(default)]
    pub rejected: Vec<RejectedRecord>,
}

/// A connection to one external system for one integration.
///
/// Implementations are shared across tasks through `Arc<dyn Connector>`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Lower-case system identifier, e.g. `netsuite`.
    fn system(&self) -> &str;

    /// Cheap round trip proving the credentials and endpoint work.
    async fn test_connection(&self) -> ConnectorResult<()>;

    /// Fetch one page of `entity` records starting at `cursor`.
    async fn fetch_entities(
        &self,
        entity: EntityKind,
        cursor: Option<&str>,
    ) -> ConnectorResult<FetchPage>;

    /// Send a batch of records already shaped for the external system.
    async fn push_entities(&self, entity: EntityKind, batch: &[Value])
        -> ConnectorResult<PushOutcome>;
}
