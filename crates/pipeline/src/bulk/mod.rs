//! CSV-driven bulk operations against the canonical store.
//!
//! An accepted upload becomes a `bulk_operations` row and a spawned task that
//! applies the rows in chunks, `max_concurrent` chunks in flight at a time.
//! Each row leaves a persisted outcome; mutating rows also leave an
//! [`UndoEntry`] so the changes can be reverted, either immediately
//! (`rollback_on_error`) or later through [`BulkEngine::rollback_operation`].

pub mod undo;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use syncbridge_core::bulk::{
    export_file_name, final_status, parse_upload, plan_chunks, render_export, render_report,
    report_file_name, shape_row, BulkOptions, BulkPlan, CsvRow, CsvUpload, ImportLimits,
    OperationType, RecordAction, RecordStatus, ReportRow, ERROR_CANCELLED, ERROR_ROLLED_BACK,
    ERROR_SKIPPED,
};
use syncbridge_core::entity::EntityKind;
use syncbridge_core::error::{CoreError, CoreResult};
use syncbridge_core::job_events::{
    EVENT_BULK_CANCELLED, EVENT_BULK_FINISHED, EVENT_BULK_ROLLED_BACK, EVENT_BULK_STARTED,
};
use syncbridge_core::transform::common::format_timestamp;
use syncbridge_core::types::{CallerContext, DbId};
use syncbridge_db::models::bulk_operation::{BulkOperation, CreateBulkOperation, NewBulkRecord};
use syncbridge_db::models::status::BulkOperationStatus;
use syncbridge_events::{EventBus, SyncEvent};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::{BulkStore, CanonicalStore};

pub use undo::UndoEntry;

/// Source entity type attached to bulk operation events.
pub const BULK_OPERATION_ENTITY: &str = "bulk_operation";

/// An accepted operation and the task processing it.
#[derive(Debug)]
pub struct BulkHandle {
    pub operation: BulkOperation,
    pub task: JoinHandle<()>,
}

/// Outcome of one chunk.
enum ChunkOutcome {
    /// Not started because the operation was cancelled or halted.
    Skipped(Range<usize>),
    Processed(ChunkReport),
}

#[derive(Default)]
struct ChunkReport {
    success_indexes: Vec<i32>,
    failed: usize,
    undo: Vec<UndoEntry>,
    records: Vec<NewBulkRecord>,
    /// Set when `records` could not be persisted.
    fault: Option<String>,
}

/// Every chunk's outcome once processing has stopped.
#[derive(Default)]
struct Tally {
    skipped: Vec<Range<usize>>,
    /// Successful rows whose outcome was recorded.
    success_indexes: Vec<i32>,
    failed: usize,
    /// Applied mutations, most recent first.
    undo: Vec<UndoEntry>,
    faults: Vec<String>,
    /// Outcomes of chunks that failed to record them.
    unrecorded: Vec<NewBulkRecord>,
}

impl Tally {
    fn collect(outcomes: Vec<ChunkOutcome>) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            match outcome {
                ChunkOutcome::Skipped(range) => tally.skipped.push(range),
                ChunkOutcome::Processed(report) => {
                    tally.undo.extend(report.undo);
                    match report.fault {
                        Some(fault) => {
                            tally.faults.push(fault);
                            tally.unrecorded.extend(report.records);
                        }
                        None => {
                            tally.success_indexes.extend(report.success_indexes);
                            tally.failed += report.failed;
                        }
                    }
                }
            }
        }
        tally.skipped.sort_by_key(|r| r.start);
        undo::reverse_order(&mut tally.undo);
        tally
    }
}

/// Stripes serializing writes to the same canonical record across chunks.
const KEY_LOCK_STRIPES: usize = 64;

#[derive(Clone)]
pub struct BulkEngine {
    store: Arc<dyn BulkStore>,
    canonical: Arc<dyn CanonicalStore>,
    events: Arc<EventBus>,
    limits: ImportLimits,
    running: Arc<Mutex<HashMap<DbId, CancellationToken>>>,
    key_locks: Arc<Vec<AsyncMutex<()>>>,
    /// Order in which mutations reached the canonical store.
    sequence: Arc<AtomicU64>,
}

impl BulkEngine {
    pub fn new<S>(stores: Arc<S>, events: Arc<EventBus>, limits: ImportLimits) -> Self
    where
        S: BulkStore + CanonicalStore + 'static,
    {
        Self {
            store: stores.clone(),
            canonical: stores,
            events,
            limits,
            running: Arc::new(Mutex::new(HashMap::new())),
            key_locks: Arc::new((0..KEY_LOCK_STRIPES).map(|_| AsyncMutex::new(())).collect()),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    fn running(&self) -> MutexGuard<'_, HashMap<DbId, CancellationToken>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key_lock(&self, tenant_id: DbId, entity: &str, key: &str) -> &AsyncMutex<()> {
        let mut hasher = DefaultHasher::new();
        (tenant_id, entity, key).hash(&mut hasher);
        let stripe = hasher.finish() % self.key_locks.len() as u64;
        &self.key_locks[usize::try_from(stripe).unwrap_or_default()]
    }

    /// Whether the operation's processing task is still alive in this
    /// process.
    pub fn is_running(&self, operation_id: DbId) -> bool {
        self.running().contains_key(&operation_id)
    }

    /// Validate the options and the upload, persist the operation and start
    /// processing it in the background.
    pub async fn start_operation(
        &self,
        caller: &CallerContext,
        upload: CsvUpload,
        options: &BulkOptions,
    ) -> CoreResult<BulkHandle> {
        let (user_id, tenant_id) = caller.require_tenant()?;
        let plan = options.validate()?;
        let parsed = parse_upload(&upload, plan.entity_type, &self.limits)?;

        let operation = self
            .store
            .create_operation(&CreateBulkOperation {
                tenant_id,
                operation_type: plan.operation_type.as_str().to_string(),
                entity_type: plan.entity_type.as_str().to_string(),
                file_name: upload.file_name.clone(),
                total_records: as_i32(parsed.len()),
                chunk_size: as_i32(plan.chunk_size),
                max_concurrent: as_i32(plan.max_concurrent),
                validate_only: plan.validate_only,
                rollback_on_error: plan.rollback_on_error,
                created_by: user_id,
            })
            .await?;

        tracing::info!(
            operation_id = operation.id,
            tenant_id,
            operation_type = plan.operation_type.as_str(),
            entity_type = %plan.entity_type,
            rows = parsed.len(),
            "Bulk operation accepted",
        );

        let token = CancellationToken::new();
        self.running().insert(operation.id, token.clone());

        let engine = self.clone();
        let op = operation.clone();
        let task = tokio::spawn(async move {
            engine.run(op, plan, parsed.rows, token).await;
        });

        Ok(BulkHandle { operation, task })
    }

    async fn run(&self, op: BulkOperation, plan: BulkPlan, rows: Vec<CsvRow>, token: CancellationToken) {
        if let Err(e) = self.execute(&op, &plan, &rows, &token).await {
            let message = e.to_string();
            tracing::error!(operation_id = op.id, error = %message, "Bulk operation aborted");
            let marked = self
                .store
                .transition_operation(
                    op.tenant_id,
                    op.id,
                    &[BulkOperationStatus::Pending, BulkOperationStatus::Processing],
                    BulkOperationStatus::Failed,
                    Some(&message),
                )
                .await;
            match marked {
                Ok(true) => self.publish(
                    &op,
                    EVENT_BULK_FINISHED,
                    json!({"status": BulkOperationStatus::Failed.name(), "error": message}),
                ),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(operation_id = op.id, error = %e, "Failed to mark bulk operation failed")
                }
            }
        }
        self.running().remove(&op.id);
    }

    async fn execute(
        &self,
        op: &BulkOperation,
        plan: &BulkPlan,
        rows: &[CsvRow],
        token: &CancellationToken,
    ) -> CoreResult<()> {
        let moved = self
            .store
            .transition_operation(
                op.tenant_id,
                op.id,
                &[BulkOperationStatus::Pending],
                BulkOperationStatus::Processing,
                None,
            )
            .await?;
        if !moved {
            return Ok(());
        }
        self.publish(op, EVENT_BULK_STARTED, json!({"total_records": rows.len()}));

        // Cancelled by the caller (parent), by the first failure when
        // rolling back on error, or by a chunk that could not be recorded.
        let halt = token.child_token();
        let outcomes: Vec<ChunkOutcome> = stream::iter(plan_chunks(rows.len(), plan.chunk_size))
            .map(|range| self.process_chunk(op, plan, rows, range, &halt))
            .buffer_unordered(plan.max_concurrent)
            .collect()
            .await;
        let tally = Tally::collect(outcomes);

        if !tally.faults.is_empty() {
            let reason = format!("results could not be recorded: {}", tally.faults.join("; "));
            return self.finish_rolled_back(op, plan, rows, &tally, &reason).await;
        }
        if token.is_cancelled() && !tally.skipped.is_empty() {
            return self.finish_cancelled(op, plan, rows, &tally).await;
        }
        if plan.rollback_on_error && tally.failed > 0 {
            let reason = format!("{} failed", tally.failed);
            return self.finish_rolled_back(op, plan, rows, &tally, &reason).await;
        }

        let saved = self
            .store
            .save_undo_data(op.tenant_id, op.id, &undo::encode(&tally.undo)?)
            .await;
        if let Err(e) = saved {
            let reason = format!("undo data could not be saved: {e}");
            return self.finish_rolled_back(op, plan, rows, &tally, &reason).await;
        }
        self.store
            .set_counts(
                op.tenant_id,
                op.id,
                as_i32(tally.success_indexes.len()),
                as_i32(tally.failed),
            )
            .await?;
        let status = final_status(tally.failed, false);
        self.finish(op, status_from_id(status), None).await
    }

    async fn process_chunk(
        &self,
        op: &BulkOperation,
        plan: &BulkPlan,
        rows: &[CsvRow],
        range: Range<usize>,
        halt: &CancellationToken,
    ) -> ChunkOutcome {
        if halt.is_cancelled() {
            return ChunkOutcome::Skipped(range);
        }

        let mut report = ChunkReport::default();
        for row in &rows[range] {
            let record_index = as_i32(row.index);
            match self.apply_row(op.tenant_id, plan, row).await {
                Ok((action, undo)) => {
                    report.success_indexes.push(record_index);
                    report.undo.extend(undo);
                    report
                        .records
                        .push(outcome_record(row, action, RecordStatus::Success, None));
                }
                Err(e) => {
                    report.failed += 1;
                    let action = RecordAction::for_operation(plan.operation_type, false);
                    report.records.push(outcome_record(
                        row,
                        action,
                        RecordStatus::Failed,
                        Some(e.to_string()),
                    ));
                }
            }
        }

        if report.failed > 0 && plan.rollback_on_error {
            halt.cancel();
        }

        if let Err(e) = self
            .store
            .insert_records(op.id, op.tenant_id, &report.records)
            .await
        {
            tracing::error!(operation_id = op.id, error = %e, "Failed to record bulk chunk");
            halt.cancel();
            report.fault = Some(e.to_string());
            return ChunkOutcome::Processed(report);
        }

        // Progress only; final counts are written when the operation ends.
        let progress = self
            .store
            .add_counts(
                op.tenant_id,
                op.id,
                as_i32(report.success_indexes.len()),
                as_i32(report.failed),
            )
            .await;
        if let Err(e) = progress {
            tracing::warn!(operation_id = op.id, error = %e, "Failed to update bulk progress");
        }
        tracing::debug!(
            operation_id = op.id,
            successful = report.success_indexes.len(),
            failed = report.failed,
            "Bulk chunk processed",
        );
        ChunkOutcome::Processed(report)
    }

    /// Apply one row. Returns the action taken and, for mutations, the undo
    /// entry.
    ///
    /// Rows sharing a key are serialized, so each entry's `previous` is the
    /// value the row actually replaced and `sequence` follows store order.
    async fn apply_row(
        &self,
        tenant_id: DbId,
        plan: &BulkPlan,
        row: &CsvRow,
    ) -> CoreResult<(RecordAction, Option<UndoEntry>)> {
        let kind = plan.entity_type;
        let record = shape_row(kind, plan.operation_type, row)?;
        let key = row.key.clone().unwrap_or_default();
        let entity = kind.as_str();

        let _guard = self.key_lock(tenant_id, entity, &key).lock().await;

        let existing = self.canonical.get(tenant_id, entity, &key).await?;
        if plan.operation_type.requires_existing() && existing.is_none() {
            return Err(CoreError::Validation(format!(
                "Row {}: {kind} '{key}' does not exist",
                row.index
            )));
        }
        let action = RecordAction::for_operation(plan.operation_type, existing.is_some());
        if plan.validate_only {
            return Ok((action, None));
        }

        let previous = match action {
            RecordAction::Export => return Ok((action, None)),
            RecordAction::Create => self.canonical.upsert(tenant_id, entity, &key, &record).await?,
            RecordAction::Update => {
                let merged = match (plan.operation_type, existing) {
                    (OperationType::Update, Some(existing)) => merge(existing, record),
                    _ => record,
                };
                self.canonical.upsert(tenant_id, entity, &key, &merged).await?
            }
            RecordAction::Delete => self.canonical.delete(tenant_id, entity, &key).await?,
        };

        Ok((
            action,
            Some(UndoEntry {
                sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
                record_index: as_i32(row.index),
                entity_type: entity.to_string(),
                record_key: key,
                action,
                previous,
            }),
        ))
    }

    async fn finish_cancelled(
        &self,
        op: &BulkOperation,
        plan: &BulkPlan,
        rows: &[CsvRow],
        tally: &Tally,
    ) -> CoreResult<()> {
        let unprocessed = self
            .record_skipped(op, plan, rows, &tally.skipped, ERROR_CANCELLED)
            .await?;
        self.store
            .set_counts(
                op.tenant_id,
                op.id,
                as_i32(tally.success_indexes.len()),
                as_i32(tally.failed + unprocessed),
            )
            .await?;
        tracing::info!(operation_id = op.id, unprocessed, "Bulk operation cancelled");

        let moved = self
            .store
            .transition_operation(
                op.tenant_id,
                op.id,
                &[BulkOperationStatus::Processing],
                BulkOperationStatus::Cancelled,
                None,
            )
            .await?;
        if moved {
            let current = self.reload(op).await?;
            self.publish(op, EVENT_BULK_CANCELLED, counts_payload(&current));
        }
        Ok(())
    }

    /// Revert every applied row and finish as failed with every row
    /// recorded as failed.
    async fn finish_rolled_back(
        &self,
        op: &BulkOperation,
        plan: &BulkPlan,
        rows: &[CsvRow],
        tally: &Tally,
        reason: &str,
    ) -> CoreResult<()> {
        let errors = undo::revert_all(self.canonical.as_ref(), op.tenant_id, &tally.undo).await;
        self.store
            .mark_records_failed(op.tenant_id, op.id, &tally.success_indexes, ERROR_ROLLED_BACK)
            .await?;
        if !tally.unrecorded.is_empty() {
            let records: Vec<NewBulkRecord> = tally
                .unrecorded
                .iter()
                .cloned()
                .map(|mut record| {
                    if record.status == RecordStatus::Success.as_str() {
                        record.status = RecordStatus::Failed.as_str().to_string();
                        record.error = Some(ERROR_ROLLED_BACK.to_string());
                    }
                    record
                })
                .collect();
            self.store.insert_records(op.id, op.tenant_id, &records).await?;
        }
        self.record_skipped(op, plan, rows, &tally.skipped, ERROR_SKIPPED).await?;
        self.store
            .set_counts(op.tenant_id, op.id, 0, as_i32(rows.len()))
            .await?;
        if let Err(e) = self.store.save_undo_data(op.tenant_id, op.id, &json!([])).await {
            tracing::warn!(operation_id = op.id, error = %e, "Failed to clear undo data");
        }

        let mut message = format!("Rolled back {} applied records after {reason}", tally.undo.len());
        if !errors.is_empty() {
            message.push_str(&format!("; {} could not be reverted", errors.len()));
        }
        tracing::warn!(operation_id = op.id, reverted = tally.undo.len(), "{message}");

        self.finish(op, BulkOperationStatus::Failed, Some(&message)).await
    }

    /// Persist rows of never-started chunks as failed with `reason`.
    async fn record_skipped(
        &self,
        op: &BulkOperation,
        plan: &BulkPlan,
        rows: &[CsvRow],
        skipped: &[Range<usize>],
        reason: &str,
    ) -> CoreResult<usize> {
        let action = RecordAction::for_operation(plan.operation_type, false);
        let records: Vec<NewBulkRecord> = skipped
            .iter()
            .flat_map(|range| &rows[range.clone()])
            .map(|row| outcome_record(row, action, RecordStatus::Failed, Some(reason.to_string())))
            .collect();
        if records.is_empty() {
            return Ok(0);
        }
        self.store.insert_records(op.id, op.tenant_id, &records).await?;
        Ok(records.len())
    }

    async fn finish(
        &self,
        op: &BulkOperation,
        status: BulkOperationStatus,
        error: Option<&str>,
    ) -> CoreResult<()> {
        let moved = self
            .store
            .transition_operation(
                op.tenant_id,
                op.id,
                &[BulkOperationStatus::Processing],
                status,
                error,
            )
            .await?;
        if !moved {
            return Ok(());
        }
        let current = self.reload(op).await?;
        tracing::info!(
            operation_id = op.id,
            status = status.name(),
            successful = current.successful_records,
            failed = current.failed_records,
            "Bulk operation finished",
        );
        self.publish(op, EVENT_BULK_FINISHED, counts_payload(&current));
        Ok(())
    }

    /// Stop a pending or processing operation at its next chunk boundary.
    ///
    /// An operation with no live task in this process (e.g. after a
    /// restart) is moved to `cancelled` directly.
    pub async fn cancel_operation(&self, caller: &CallerContext, operation_id: DbId) -> CoreResult<BulkOperation> {
        let (_, tenant_id) = caller.require_tenant()?;
        let op = self.find_owned(tenant_id, operation_id).await?;
        if syncbridge_core::bulk::status::is_finished(op.status_id) {
            return Err(finished_conflict(&op));
        }

        let token = self.running().get(&operation_id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                tracing::info!(operation_id, "Bulk operation cancellation requested");
            }
            None => {
                let moved = self
                    .store
                    .transition_operation(
                        tenant_id,
                        operation_id,
                        &[BulkOperationStatus::Pending, BulkOperationStatus::Processing],
                        BulkOperationStatus::Cancelled,
                        None,
                    )
                    .await?;
                if !moved {
                    let op = self.find_owned(tenant_id, operation_id).await?;
                    return Err(finished_conflict(&op));
                }
                tracing::info!(operation_id, "Orphaned bulk operation cancelled");
                self.publish(&op, EVENT_BULK_CANCELLED, json!({}));
            }
        }
        self.find_owned(tenant_id, operation_id).await
    }

    /// Revert a completed or partial operation from its persisted undo log.
    ///
    /// The reversal runs in a spawned task; failures are logged there.
    pub async fn rollback_operation(&self, caller: &CallerContext, operation_id: DbId) -> CoreResult<BulkHandle> {
        let (_, tenant_id) = caller.require_tenant()?;
        let op = self.find_owned(tenant_id, operation_id).await?;
        if !matches!(
            op.status(),
            Some(BulkOperationStatus::Completed | BulkOperationStatus::Partial)
        ) || self.is_running(operation_id)
        {
            let status = op.status().map(BulkOperationStatus::name).unwrap_or("unknown");
            return Err(CoreError::Conflict(format!(
                "Bulk operation {operation_id} cannot be rolled back while {status}"
            )));
        }
        let mut entries = undo::decode(&op.undo_data)?;
        undo::reverse_order(&mut entries);

        let engine = self.clone();
        let operation = op.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = engine.revert_finished(&op, &entries).await {
                tracing::error!(operation_id = op.id, error = %e, "Bulk rollback failed");
            }
        });
        Ok(BulkHandle { operation, task })
    }

    async fn revert_finished(&self, op: &BulkOperation, entries: &[UndoEntry]) -> CoreResult<()> {
        let errors = undo::revert_all(self.canonical.as_ref(), op.tenant_id, entries).await;
        let indexes: Vec<i32> = entries.iter().map(|e| e.record_index).collect();
        let reverted = as_i32(indexes.len());
        self.store
            .mark_records_failed(op.tenant_id, op.id, &indexes, ERROR_ROLLED_BACK)
            .await?;
        self.store
            .set_counts(
                op.tenant_id,
                op.id,
                (op.successful_records - reverted).max(0),
                op.failed_records + reverted,
            )
            .await?;
        self.store
            .save_undo_data(op.tenant_id, op.id, &json!([]))
            .await?;

        let error = (!errors.is_empty()).then(|| {
            format!("{} of {} records could not be reverted", errors.len(), entries.len())
        });
        let moved = self
            .store
            .transition_operation(
                op.tenant_id,
                op.id,
                &[BulkOperationStatus::Completed, BulkOperationStatus::Partial],
                BulkOperationStatus::RolledBack,
                error.as_deref(),
            )
            .await?;
        if moved {
            tracing::info!(operation_id = op.id, reverted, "Bulk operation rolled back");
            self.publish(
                op,
                EVENT_BULK_ROLLED_BACK,
                json!({"reverted_records": reverted, "errors": errors.len()}),
            );
        }
        Ok(())
    }

    pub async fn get_operation(&self, caller: &CallerContext, operation_id: DbId) -> CoreResult<BulkOperation> {
        let (_, tenant_id) = caller.require_tenant()?;
        self.find_owned(tenant_id, operation_id).await
    }

    /// Per-record report as `(file name, CSV text)`.
    pub async fn generate_report(&self, caller: &CallerContext, operation_id: DbId) -> CoreResult<(String, String)> {
        let (_, tenant_id) = caller.require_tenant()?;
        self.find_owned(tenant_id, operation_id).await?;

        let rows: Vec<ReportRow> = self
            .store
            .list_records(tenant_id, operation_id)
            .await?
            .into_iter()
            .map(|r| ReportRow {
                record_index: r.record_index,
                action: r.action,
                status: r.status,
                error: r.error,
                processed_at: format_timestamp(r.processed_at),
            })
            .collect();
        Ok((report_file_name(operation_id), render_report(&rows)))
    }

    /// Current canonical data of every successfully exported row as
    /// `(file name, CSV text)`.
    pub async fn export_csv(&self, caller: &CallerContext, operation_id: DbId) -> CoreResult<(String, String)> {
        let (_, tenant_id) = caller.require_tenant()?;
        let op = self.find_owned(tenant_id, operation_id).await?;
        if op.operation_type != OperationType::Export.as_str() {
            return Err(CoreError::Validation(format!(
                "Bulk operation {operation_id} is not an export"
            )));
        }
        let kind: EntityKind = op.entity_type.parse()?;

        let mut exported = Vec::new();
        for record in self.store.list_records(tenant_id, operation_id).await? {
            if record.status != RecordStatus::Success.as_str() {
                continue;
            }
            let Some(key) = record.record_key else {
                continue;
            };
            if let Some(data) = self.canonical.get(tenant_id, kind.as_str(), &key).await? {
                exported.push(data);
            }
        }
        Ok((
            export_file_name(operation_id),
            render_export(kind.canonical_key_field(), &exported),
        ))
    }

    async fn find_owned(&self, tenant_id: DbId, operation_id: DbId) -> CoreResult<BulkOperation> {
        self.store
            .find_operation(tenant_id, operation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "BulkOperation",
                id: operation_id,
            })
    }

    async fn reload(&self, op: &BulkOperation) -> CoreResult<BulkOperation> {
        self.find_owned(op.tenant_id, op.id).await
    }

    fn publish(&self, op: &BulkOperation, event_type: &str, payload: Value) {
        self.events.publish(
            SyncEvent::new(event_type)
                .with_source(BULK_OPERATION_ENTITY, op.id)
                .with_tenant(op.tenant_id)
                .with_actor(op.created_by)
                .with_payload(payload),
        );
    }
}

fn outcome_record(row: &CsvRow, action: RecordAction, status: RecordStatus, error: Option<String>) -> NewBulkRecord {
    NewBulkRecord {
        record_index: as_i32(row.index),
        record_key: row.key.clone(),
        action: action.as_str().to_string(),
        status: status.as_str().to_string(),
        error,
    }
}

/// Overlay the fields of `patch` onto `base`.
fn merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            base.extend(patch);
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

fn counts_payload(op: &BulkOperation) -> Value {
    json!({
        "status": op.status().map(BulkOperationStatus::name).unwrap_or("unknown"),
        "total_records": op.total_records,
        "successful_records": op.successful_records,
        "failed_records": op.failed_records,
    })
}

fn finished_conflict(op: &BulkOperation) -> CoreError {
    let status = op.status().map(BulkOperationStatus::name).unwrap_or("unknown");
    CoreError::Conflict(format!("Bulk operation {} is already {status}", op.id))
}

fn status_from_id(id: i16) -> BulkOperationStatus {
    BulkOperationStatus::from_id(id).unwrap_or(BulkOperationStatus::Failed)
}

fn as_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_fields() {
        let merged = merge(
            json!({"sku": "A", "name": "Bolt", "price": 1.0}),
            json!({"sku": "A", "price": 2.5}),
        );
        assert_eq!(merged, json!({"sku": "A", "name": "Bolt", "price": 2.5}));
    }

    #[test]
    fn merge_replaces_non_objects() {
        assert_eq!(merge(Value::Null, json!({"sku": "A"})), json!({"sku": "A"}));
    }

    #[test]
    fn unknown_status_id_falls_back_to_failed() {
        assert_eq!(status_from_id(3), BulkOperationStatus::Completed);
        assert_eq!(status_from_id(42), BulkOperationStatus::Failed);
    }
}
