//! In-process implementation of every store seam.
//!
//! Mirrors the conditional-update semantics of the Postgres repositories so
//! the orchestrator, runner and bulk engine behave the same on both. Also
//! supports fault injection for the enqueue and compensation paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
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

use super::{BulkStore, CanonicalStore, SyncJobStore, SyncQueue};

type CanonicalKey = (DbId, String, String);

#[derive(Default)]
struct State {
    next_id: DbId,
    integrations: HashMap<DbId, Integration>,
    jobs: BTreeMap<DbId, SyncJob>,
    queue: Vec<SyncQueueItem>,
    canonical: BTreeMap<CanonicalKey, CanonicalRecord>,
    operations: BTreeMap<DbId, BulkOperation>,
    records: Vec<BulkOperationRecord>,
    enqueue_error: Option<String>,
    delete_error: Option<String>,
    transition_error: Option<String>,
    /// Record key whose next lookup is delayed, and by how long.
    slow_get: Option<(String, Duration)>,
    /// Calls to skip before an insert of bulk records fails, and the error.
    record_insert_error: Option<(usize, String)>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStores {
    state: Mutex<State>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an active integration owned by `tenant_id`.
    pub fn add_integration(&self, tenant_id: DbId, system: &str, config: Value) -> Integration {
        let mut state = self.lock();
        let now = Utc::now();
        let integration = Integration {
            id: state.next_id(),
            tenant_id,
            system: system.to_string(),
            name: format!("{system} integration"),
            config,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.integrations.insert(integration.id, integration.clone());
        integration
    }

    /// Make every subsequent enqueue fail with `message`.
    pub fn fail_enqueue(&self, message: impl Into<String>) {
        self.lock().enqueue_error = Some(message.into());
    }

    /// Make every subsequent job delete fail with `message`.
    pub fn fail_job_delete(&self, message: impl Into<String>) {
        self.lock().delete_error = Some(message.into());
    }

    /// Make the next job status transition fail with `message`.
    pub fn fail_next_job_transition(&self, message: impl Into<String>) {
        self.lock().transition_error = Some(message.into());
    }

    /// Delay the next canonical lookup of `key` by `delay`.
    pub fn delay_next_get(&self, key: impl Into<String>, delay: Duration) {
        self.lock().slow_get = Some((key.into(), delay));
    }

    /// Fail the bulk record insert after the next `succeed` ones with
    /// `message`. Fires once.
    pub fn fail_record_insert_after(&self, succeed: usize, message: impl Into<String>) {
        self.lock().record_insert_error = Some((succeed, message.into()));
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn canonical_count(&self, tenant_id: DbId, entity_type: &str) -> usize {
        self.lock()
            .canonical
            .keys()
            .filter(|(t, e, _)| *t == tenant_id && e == entity_type)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Sync jobs
// ---------------------------------------------------------------------------

#[async_trait]
impl SyncJobStore for MemoryStores {
    async fn find_integration(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<Integration>> {
        Ok(self
            .lock()
            .integrations
            .get(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn create_job(&self, input: &CreateSyncJob) -> CoreResult<SyncJob> {
        let mut state = self.lock();
        let now = Utc::now();
        let job = SyncJob {
            id: state.next_id(),
            tenant_id: input.tenant_id,
            integration_id: input.integration_id,
            job_type: input.job_type.clone(),
            entity_types: input.entity_types.clone(),
            sync_mode: input.sync_mode.clone(),
            batch_size: input.batch_size,
            priority: input.priority.clone(),
            status_id: SyncJobStatus::Pending.id(),
            records_processed: 0,
            records_failed: 0,
            error_message: None,
            created_by: input.created_by,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<SyncJob>> {
        Ok(self
            .lock()
            .jobs
            .get(&id)
            .filter(|j| j.tenant_id == tenant_id)
            .cloned())
    }

    async fn delete_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<bool> {
        let mut state = self.lock();
        if let Some(message) = &state.delete_error {
            return Err(CoreError::Internal(message.clone()));
        }
        let owned = state.jobs.get(&id).is_some_and(|j| j.tenant_id == tenant_id);
        if owned {
            state.jobs.remove(&id);
            state.queue.retain(|item| item.job_id != id);
        }
        Ok(owned)
    }

    async fn transition_job(
        &self,
        tenant_id: DbId,
        id: DbId,
        from: SyncJobStatus,
        to: SyncJobStatus,
    ) -> CoreResult<bool> {
        let mut state = self.lock();
        if let Some(message) = state.transition_error.take() {
            return Err(CoreError::Internal(message));
        }
        let Some(job) = state
            .jobs
            .get_mut(&id)
            .filter(|j| j.tenant_id == tenant_id && j.status_id == from.id())
        else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status_id = to.id();
        job.updated_at = now;
        if to == SyncJobStatus::Running {
            job.started_at = Some(now);
        }
        Ok(true)
    }

    async fn add_job_progress(
        &self,
        tenant_id: DbId,
        id: DbId,
        processed: i32,
        failed: i32,
    ) -> CoreResult<()> {
        if let Some(job) = self.lock().jobs.get_mut(&id).filter(|j| j.tenant_id == tenant_id) {
            job.records_processed += processed;
            job.records_failed += failed;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_job(
        &self,
        tenant_id: DbId,
        id: DbId,
        status: SyncJobStatus,
        error: Option<&str>,
    ) -> CoreResult<bool> {
        let mut state = self.lock();
        let Some(job) = state
            .jobs
            .get_mut(&id)
            .filter(|j| j.tenant_id == tenant_id && j.status_id == SyncJobStatus::Running.id())
        else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status_id = status.id();
        job.error_message = error.map(str::to_string);
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn cancel_job(&self, tenant_id: DbId, id: DbId) -> CoreResult<bool> {
        let mut state = self.lock();
        let Some(job) = state
            .jobs
            .get_mut(&id)
            .filter(|j| j.tenant_id == tenant_id && !j.is_terminal())
        else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status_id = SyncJobStatus::Cancelled.id();
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }
}

#[async_trait]
impl SyncQueue for MemoryStores {
    async fn enqueue(&self, job_id: DbId, tenant_id: DbId, priority: i32) -> CoreResult<SyncQueueItem> {
        let mut state = self.lock();
        if let Some(message) = &state.enqueue_error {
            return Err(CoreError::Connectivity(message.clone()));
        }
        let item = SyncQueueItem {
            id: state.next_id(),
            job_id,
            tenant_id,
            priority,
            enqueued_at: Utc::now(),
            claimed_at: None,
        };
        state.queue.push(item.clone());
        Ok(item)
    }

    async fn dequeue(&self) -> CoreResult<Option<SyncQueueItem>> {
        let mut state = self.lock();
        let next = state
            .queue
            .iter_mut()
            .filter(|item| item.claimed_at.is_none())
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.enqueued_at.cmp(&a.enqueued_at))
                    .then_with(|| b.id.cmp(&a.id))
            });
        Ok(next.map(|item| {
            item.claimed_at = Some(Utc::now());
            item.clone()
        }))
    }

    async fn ack(&self, item_id: DbId) -> CoreResult<()> {
        self.lock().queue.retain(|item| item.id != item_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

fn canonical_key(tenant_id: DbId, entity_type: &str, key: &str) -> CanonicalKey {
    (tenant_id, entity_type.to_string(), key.to_string())
}

#[async_trait]
impl CanonicalStore for MemoryStores {
    async fn get(&self, tenant_id: DbId, entity_type: &str, key: &str) -> CoreResult<Option<Value>> {
        let delay = {
            let mut state = self.lock();
            let slow = state.slow_get.as_ref().is_some_and(|(slow_key, _)| slow_key == key);
            if slow {
                state.slow_get.take().map(|(_, delay)| delay)
            } else {
                None
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .lock()
            .canonical
            .get(&canonical_key(tenant_id, entity_type, key))
            .map(|r| r.data.clone()))
    }

    async fn upsert(
        &self,
        tenant_id: DbId,
        entity_type: &str,
        key: &str,
        data: &Value,
    ) -> CoreResult<Option<Value>> {
        let record = CanonicalRecord {
            tenant_id,
            entity_type: entity_type.to_string(),
            record_key: key.to_string(),
            data: data.clone(),
            updated_at: Utc::now(),
        };
        let previous = self
            .lock()
            .canonical
            .insert(canonical_key(tenant_id, entity_type, key), record);
        Ok(previous.map(|r| r.data))
    }

    async fn delete(&self, tenant_id: DbId, entity_type: &str, key: &str) -> CoreResult<Option<Value>> {
        Ok(self
            .lock()
            .canonical
            .remove(&canonical_key(tenant_id, entity_type, key))
            .map(|r| r.data))
    }

    async fn list(
        &self,
        tenant_id: DbId,
        entity_type: &str,
        after_key: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<CanonicalRecord>> {
        Ok(self
            .lock()
            .canonical
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.entity_type == entity_type)
            .filter(|r| after_key.map_or(true, |after| r.record_key.as_str() > after))
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Bulk operations
// ---------------------------------------------------------------------------

#[async_trait]
impl BulkStore for MemoryStores {
    async fn create_operation(&self, input: &CreateBulkOperation) -> CoreResult<BulkOperation> {
        let mut state = self.lock();
        let now = Utc::now();
        let operation = BulkOperation {
            id: state.next_id(),
            tenant_id: input.tenant_id,
            operation_type: input.operation_type.clone(),
            entity_type: input.entity_type.clone(),
            status_id: BulkOperationStatus::Pending.id(),
            file_name: input.file_name.clone(),
            total_records: input.total_records,
            chunk_size: input.chunk_size,
            max_concurrent: input.max_concurrent,
            validate_only: input.validate_only,
            rollback_on_error: input.rollback_on_error,
            successful_records: 0,
            failed_records: 0,
            undo_data: Value::Array(Vec::new()),
            error_message: None,
            created_by: input.created_by,
            created_at: now,
            started_at: None,
            completed_at: None,
            rolled_back_at: None,
            updated_at: now,
        };
        state.operations.insert(operation.id, operation.clone());
        Ok(operation)
    }

    async fn find_operation(&self, tenant_id: DbId, id: DbId) -> CoreResult<Option<BulkOperation>> {
        Ok(self
            .lock()
            .operations
            .get(&id)
            .filter(|op| op.tenant_id == tenant_id)
            .cloned())
    }

    async fn transition_operation(
        &self,
        tenant_id: DbId,
        id: DbId,
        from: &[BulkOperationStatus],
        to: BulkOperationStatus,
        error: Option<&str>,
    ) -> CoreResult<bool> {
        let mut state = self.lock();
        let Some(op) = state
            .operations
            .get_mut(&id)
            .filter(|op| op.tenant_id == tenant_id && from.iter().any(|s| s.id() == op.status_id))
        else {
            return Ok(false);
        };
        let now = Utc::now();
        op.status_id = to.id();
        if let Some(error) = error {
            op.error_message = Some(error.to_string());
        }
        match to {
            BulkOperationStatus::Processing => op.started_at = Some(now),
            BulkOperationStatus::RolledBack => op.rolled_back_at = Some(now),
            BulkOperationStatus::Pending => {}
            _ => op.completed_at = Some(now),
        }
        op.updated_at = now;
        Ok(true)
    }

    async fn add_counts(
        &self,
        tenant_id: DbId,
        id: DbId,
        successful: i32,
        failed: i32,
    ) -> CoreResult<()> {
        if let Some(op) = self.lock().operations.get_mut(&id).filter(|op| op.tenant_id == tenant_id) {
            op.successful_records += successful;
            op.failed_records += failed;
            op.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_counts(
        &self,
        tenant_id: DbId,
        id: DbId,
        successful: i32,
        failed: i32,
    ) -> CoreResult<()> {
        if let Some(op) = self.lock().operations.get_mut(&id).filter(|op| op.tenant_id == tenant_id) {
            op.successful_records = successful;
            op.failed_records = failed;
            op.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn save_undo_data(&self, tenant_id: DbId, id: DbId, undo_data: &Value) -> CoreResult<()> {
        if let Some(op) = self.lock().operations.get_mut(&id).filter(|op| op.tenant_id == tenant_id) {
            op.undo_data = undo_data.clone();
            op.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_records(
        &self,
        operation_id: DbId,
        tenant_id: DbId,
        records: &[NewBulkRecord],
    ) -> CoreResult<()> {
        let mut state = self.lock();
        if let Some((remaining, message)) = state.record_insert_error.take() {
            if remaining == 0 {
                return Err(CoreError::Internal(message));
            }
            state.record_insert_error = Some((remaining - 1, message));
        }
        for record in records {
            let duplicate = state
                .records
                .iter()
                .any(|r| r.operation_id == operation_id && r.record_index == record.record_index);
            if duplicate {
                return Err(CoreError::Conflict(format!(
                    "Record {} of bulk operation {operation_id} already recorded",
                    record.record_index
                )));
            }
            let row = BulkOperationRecord {
                id: state.next_id(),
                operation_id,
                tenant_id,
                record_index: record.record_index,
                record_key: record.record_key.clone(),
                action: record.action.clone(),
                status: record.status.clone(),
                error: record.error.clone(),
                processed_at: Utc::now(),
            };
            state.records.push(row);
        }
        Ok(())
    }

    async fn mark_records_failed(
        &self,
        tenant_id: DbId,
        operation_id: DbId,
        record_indexes: &[i32],
        error: &str,
    ) -> CoreResult<u64> {
        let mut updated = 0;
        let now = Utc::now();
        for record in self.lock().records.iter_mut().filter(|r| {
            r.operation_id == operation_id
                && r.tenant_id == tenant_id
                && record_indexes.contains(&r.record_index)
        })
        {
            record.status = "failed".to_string();
            record.error = Some(error.to_string());
            record.processed_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn list_records(
        &self,
        tenant_id: DbId,
        operation_id: DbId,
    ) -> CoreResult<Vec<BulkOperationRecord>> {
        let mut records: Vec<BulkOperationRecord> = self
            .lock()
            .records
            .iter()
            .filter(|r| r.operation_id == operation_id && r.tenant_id == tenant_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.record_index);
        Ok(records)
    }
}
