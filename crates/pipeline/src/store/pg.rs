//! Postgres adapters over the `syncbridge-db` repositories.

use async_trait::async_trait;
use serde_json::Value;
use syncbridge_core::error::{CoreError, CoreResult};
use syncbridge_core::types::DbId;
use syncbridge_db::models::bulk_operation::{
    BulkOperation, BulkOperationRecord, CreateBulkOperation, NewBulkRecord,
};
use syncbridge_db::models::canonical::CanonicalRecord;
use syncbridge_db::models::integration::Integration;
use syncbridge_db::models::status::{BulkOperationStatus, SyncJobStatus};
use syncbridge_db::models::sync_job::{CreateSyncJob, SyncJob};
use syncbridge_db::models::sync_queue::SyncQueueItem;
use syncbridge_db::repositories::{
    BulkOperationRecordRepo, BulkOperationRepo, CanonicalRecordRepo, IntegrationRepo,
    SyncJobRepo, SyncQueueRepo,
};
use syncbridge_db::DbPool;

use super::{BulkStore, CanonicalStore, SyncJobStore, SyncQueue};

/// All four stores over one connection pool.
#[derive(Clone)]
pub struct PgStores {
    pool: DbPool,
}

impl PgStores {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("Database error: {e}"))
}

#[async_trait]
impl SyncJobStore for PgStores {
    async fn find_integration(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<Integration>> {
        IntegrationRepo::find_for_tenant(&self.pool, tenant_id, id)
            .await
            .map_err(db_err)
    }

    async fn create_job(&self, input: &CreateSyncJob) -> CoreResult<SyncJob> {
        SyncJobRepo::create(&self.pool, input).await.map_err(db_err)
    }

    async fn find_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<SyncJob>> {
        SyncJobRepo::find_for_tenant(&self.pool, tenant_id, id)
            .await
            .map_err(db_err)
    }

    async fn delete_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<bool> {
        SyncJobRepo::delete(&self.pool, tenant_id, id)
            .await
            .map_err(db_err)
    }

    async fn transition_job(
        &self,
        tenant_id: DbId,
        id: DbId,
        from: SyncJobStatus,
        to: SyncJobStatus,
    ) -> CoreResult<bool> {
        SyncJobRepo::transition(&self.pool, tenant_id, id, from, to)
            .await
            .map_err(db_err)
    }

    async fn add_job_progress(
        &self,
        tenant_id: DbId,
        id: DbId,
        processed: i32,
        failed: i32,
    ) -> CoreResult<()> {
        SyncJobRepo::add_progress(&self.pool, tenant_id, id, processed, failed)
            .await
            .map_err(db_err)
    }

    async fn finish_job(
        &self,
        tenant_id: DbId,
        id: DbId,
        status: SyncJobStatus,
        error: Option<&str>,
    ) -> CoreResult<bool> {
        SyncJobRepo::finish(&self.pool, tenant_id, id, status, error)
            .await
            .map_err(db_err)
    }

    async fn cancel_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<bool> {
        SyncJobRepo::cancel(&self.pool, tenant_id, id)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl SyncQueue for PgStores {
    async fn enqueue(&self, job_id: DbId, tenant_id: DbId, priority: i32) -> CoreResult<SyncQueueItem> {
        SyncQueueRepo::enqueue(&self.pool, job_id, tenant_id, priority)
            .await
            .map_err(|e| CoreError::Connectivity(format!("Failed to enqueue sync job {job_id}: {e}")))
    }

    async fn dequeue(&self) -> CoreResult<Option<SyncQueueItem>> {
        SyncQueueRepo::claim_next(&self.pool).await.map_err(db_err)
    }

    async fn ack(&self, item_id: DbId) -> CoreResult<()> {
        SyncQueueRepo::ack(&self.pool, item_id).await.map_err(db_err)
    }
}

#[async_trait]
impl CanonicalStore for PgStores {
    async fn get(&self, tenant_id: DbId, entity_type: &str, key: &str) -> CoreResult<Option<Value>> {
        let record = CanonicalRecordRepo::get(&self.pool, tenant_id, entity_type, key)
            .await
            .map_err(db_err)?;
        Ok(record.map(|r| r.data))
    }

    async fn upsert(
        &self,
        tenant_id: DbId,
        entity_type: &str,
        key: &str,
        data: &Value,
    ) -> CoreResult<Option<Value>> {
        CanonicalRecordRepo::upsert(&self.pool, tenant_id, entity_type, key, data)
            .await
            .map_err(db_err)
    }

    async fn delete(&self, tenant_id: DbId, entity_type: &str, key: &str) -> CoreResult<Option<Value>> {
        CanonicalRecordRepo::delete(&self.pool, tenant_id, entity_type, key)
            .await
            .map_err(db_err)
    }

    async fn list(
        &self,
        tenant_id: DbId,
        entity_type: &str,
        after_key: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<CanonicalRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        CanonicalRecordRepo::list(&self.pool, tenant_id, entity_type, after_key, limit)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl BulkStore for PgStores {
    async fn create_operation(&self, input: &CreateBulkOperation) -> CoreResult<BulkOperation> {
        BulkOperationRepo::create(&self.pool, input)
            .await
            .map_err(db_err)
    }

    async fn find_operation(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<BulkOperation>> {
        BulkOperationRepo::find_for_tenant(&self.pool, tenant_id, id)
            .await
            .map_err(db_err)
    }

    async fn transition_operation(
        &self,
        tenant_id: DbId,
        id: DbId,
        from: &[BulkOperationStatus],
        to: BulkOperationStatus,
        error: Option<&str>,
    ) -> CoreResult<bool> {
        BulkOperationRepo::transition(&self.pool, tenant_id, id, from, to, error)
            .await
            .map_err(db_err)
    }

    async fn add_counts(
        &self,
        tenant_id: DbId,
        id: DbId,
        successful: i32,
        failed: i32,
    ) -> CoreResult<()> {
        BulkOperationRepo::add_counts(&self.pool, tenant_id, id, successful, failed)
            .await
            .map_err(db_err)
    }

    async fn set_counts(
        &self,
        tenant_id: DbId,
        id: DbId,
        successful: i32,
        failed: i32,
    ) -> CoreResult<()> {
        BulkOperationRepo::set_counts(&self.pool, tenant_id, id, successful, failed)
            .await
            .map_err(db_err)
    }

    async fn save_undo_data(&self, tenant_id: DbId, id: DbId, undo_data: &Value) -> CoreResult<()> {
        BulkOperationRepo::save_undo_data(&self.pool, tenant_id, id, undo_data)
            .await
            .map_err(db_err)
    }

    async fn insert_records(
        &self,
        operation_id: DbId,
        tenant_id: DbId,
        records: &[NewBulkRecord],
    ) -> CoreResult<()> {
        BulkOperationRecordRepo::insert_many(&self.pool, operation_id, tenant_id, records)
            .await
            .map_err(db_err)
    }

    async fn mark_records_failed(
        &self,
        tenant_id: DbId,
        operation_id: DbId,
        record_indexes: &[i32],
        error: &str,
    ) -> CoreResult<u64> {
        BulkOperationRecordRepo::mark_failed(&self.pool, tenant_id, operation_id, record_indexes, error)
            .await
            .map_err(db_err)
    }

    async fn list_records(
        &self,
        tenant_id: DbId,
        operation_id: DbId,
    ) -> CoreResult<Vec<BulkOperationRecord>> {
        BulkOperationRecordRepo::list_for_operation(&self.pool, tenant_id, operation_id)
            .await
            .map_err(db_err)
    }
}
