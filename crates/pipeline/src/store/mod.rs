//! Persistence seams used by the orchestrator, the runner and the bulk
//! engine.
//!
//! Every read and write is scoped to a tenant; the only exception is
//! [`SyncQueue::dequeue`], which claims work across tenants. The
//! Postgres adapter ([`pg::PgStores`]) delegates to `syncbridge-db`
//! repositories; [`memory::MemoryStores`] keeps everything in process for
//! tests and local tooling.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use serde_json::Value;
use syncbridge_core::error::CoreResult;
use syncbridge_core::types::DbId;
use syncbridge_db::models::bulk_operation::{
    BulkOperation, BulkOperationRecord, CreateBulkOperation, NewBulkRecord,
};
use syncbridge_db::models::canonical::CanonicalRecord;
use syncbridge_db::models::integration::Integration;
use syncbridge_db::models::status::{BulkOperationStatus, SyncJobStatus};
use syncbridge_db::models::sync_job::{CreateSyncJob, SyncJob};
use syncbridge_db::models::sync_queue::SyncQueueItem;

pub use memory::MemoryStores;
pub use pg::PgStores;

/// Sync job rows and the integrations they point at.
#[async_trait]
pub trait SyncJobStore: Send + Sync {
    async fn find_integration(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<Integration>>;

    async fn create_job(&self, input: &CreateSyncJob) -> CoreResult<SyncJob>;

    async fn find_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<SyncJob>>;

    async fn delete_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<bool>;

    /// Conditional move; `false` when the job was not in `from`.
    async fn transition_job(
        &self,
        tenant_id: DbId,
        id: DbId,
        from: SyncJobStatus,
        to: SyncJobStatus,
    ) -> CoreResult<bool>;

    async fn add_job_progress(
        &self,
        tenant_id: DbId,
        id: DbId,
        processed: i32,
        failed: i32,
    ) -> CoreResult<()>;

    /// Finish a running job as completed or failed.
    async fn finish_job(
        &self,
        tenant_id: DbId,
        id: DbId,
        status: SyncJobStatus,
        error: Option<&str>,
    ) -> CoreResult<bool>;

    /// Cancel a non-terminal job; `false` when it was already terminal.
    async fn cancel_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<bool>;
}

/// Priority queue substrate.
#[async_trait]
pub trait SyncQueue: Send + Sync {
    async fn enqueue(&self, job_id: DbId, tenant_id: DbId, priority: i32) -> CoreResult<SyncQueueItem>;

    /// Claim the highest-priority, oldest unclaimed item.
    async fn dequeue(&self) -> CoreResult<Option<SyncQueueItem>>;

    async fn ack(&self, item_id: DbId) -> CoreResult<()>;
}

/// Canonical record storage keyed by `(tenant, entity type, record key)`.
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    async fn get(&self, tenant_id: DbId, entity_type: &str, key: &str) -> CoreResult<Option<Value>>;

    /// Insert or replace; returns the previous data.
    async fn upsert(
        &self,
        tenant_id: DbId,
        entity_type: &str,
        key: &str,
        data: &Value,
    ) -> CoreResult<Option<Value>>;

    /// Remove; returns the removed data.
    async fn delete(&self, tenant_id: DbId, entity_type: &str, key: &str) -> CoreResult<Option<Value>>;

    /// Keyset page ordered by record key.
    async fn list(
        &self,
        tenant_id: DbId,
        entity_type: &str,
        after_key: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<CanonicalRecord>>;
}

/// Bulk operations and their per-row outcomes.
#[async_trait]
pub trait BulkStore: Send + Sync {
    async fn create_operation(&self, input: &CreateBulkOperation) -> CoreResult<BulkOperation>;

    async fn find_operation(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<BulkOperation>>;

    async fn transition_operation(
        &self,
        tenant_id: DbId,
        id: DbId,
        from: &[BulkOperationStatus],
        to: BulkOperationStatus,
        error: Option<&str>,
    ) -> CoreResult<bool>;

    async fn add_counts(&self, tenant_id: DbId, id: DbId, successful: i32, failed: i32)
        -> CoreResult<()>;

    async fn set_counts(&self, tenant_id: DbId, id: DbId, successful: i32, failed: i32)
        -> CoreResult<()>;

    async fn save_undo_data(&self, tenant_id: DbId, id: DbId, undo_data: &Value) -> CoreResult<()>;

    async fn insert_records(
        &self,
        operation_id: DbId,
        tenant_id: DbId,
        records: &[NewBulkRecord],
    ) -> CoreResult<()>;

    async fn mark_records_failed(
        &self,
        tenant_id: DbId,
        operation_id: DbId,
        record_indexes: &[i32],
        error: &str,
    ) -> CoreResult<u64>;

    async fn list_records(&self, tenant_id: DbId, operation_id: DbId)
        -> CoreResult<Vec<BulkOperationRecord>>;
}
