//! Queue-draining execution of sync jobs.
//!
//! [`SyncJobRunner::run`] polls the queue on a fixed interval and executes up
//! to `max_concurrent_jobs` jobs at once. A job pulls each entity type page
//! by page into the canonical store and/or pushes canonical records out in
//! `batch_size` batches. Cancellation is observed between pages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use syncbridge_connectors::{Connector, ConnectorCache};
use syncbridge_core::entity::EntityKind;
use syncbridge_core::error::{CoreError, CoreResult};
use syncbridge_core::job_events::{EVENT_JOB_COMPLETED, EVENT_JOB_FAILED, EVENT_JOB_STARTED};
use syncbridge_core::scheduling::SyncMode;
use syncbridge_core::types::DbId;
use syncbridge_db::models::integration::Integration;
use syncbridge_db::models::status::SyncJobStatus;
use syncbridge_db::models::sync_job::SyncJob;
use syncbridge_db::models::sync_queue::SyncQueueItem;
use syncbridge_events::{EventBus, SyncEvent};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::normalize::{canonical_key, Normalizer};
use crate::orchestrator::SYNC_JOB_ENTITY;
use crate::store::{CanonicalStore, SyncJobStore, SyncQueue};

/// Records moved by one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub processed: i32,
    pub failed: i32,
}

impl SyncTotals {
    fn add(&mut self, processed: i32, failed: i32) {
        self.processed += processed;
        self.failed += failed;
    }
}

enum Flow {
    Continue,
    Cancelled,
}

enum RunOutcome {
    Finished(SyncTotals),
    Cancelled,
}

#[derive(Clone)]
pub struct SyncJobRunner {
    jobs: Arc<dyn SyncJobStore>,
    queue: Arc<dyn SyncQueue>,
    canonical: Arc<dyn CanonicalStore>,
    connectors: Arc<ConnectorCache>,
    normalizer: Arc<Normalizer>,
    events: Arc<EventBus>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl SyncJobRunner {
    pub fn new<S>(
        stores: Arc<S>,
        connectors: Arc<ConnectorCache>,
        normalizer: Arc<Normalizer>,
        events: Arc<EventBus>,
        max_concurrent_jobs: usize,
    ) -> Self
    where
        S: SyncJobStore + SyncQueue + CanonicalStore + 'static,
    {
        Self {
            jobs: stores.clone(),
            queue: stores.clone(),
            canonical: stores,
            connectors,
            normalizer,
            events,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            tracker: TaskTracker::new(),
        }
    }

    /// Poll the queue until `cancel` fires, then wait for in-flight jobs.
    pub async fn run(&self, poll_interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(poll_interval);
        tracing::info!(
            poll_interval_ms = poll_interval.as_millis() as u64,
            max_concurrent_jobs = self.permits.available_permits(),
            "Sync job runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Sync job runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_available().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Sync job runner stopped");
    }

    /// Claim queue items while permits are free and spawn one task per job.
    /// Returns how many jobs were started.
    pub async fn dispatch_available(&self) -> CoreResult<usize> {
        let mut started = 0;
        while let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            let Some(item) = self.queue.dequeue().await? else {
                break;
            };
            tracing::debug!(job_id = item.job_id, priority = item.priority, "Job claimed");

            let runner = self.clone();
            self.tracker.spawn(async move {
                runner.process(item).await;
                drop(permit);
            });
            started += 1;
        }
        Ok(started)
    }

    /// Claim and execute the next queued job on the current task.
    /// Returns the job id, or `None` when the queue is empty.
    pub async fn run_next(&self) -> CoreResult<Option<DbId>> {
        let Some(item) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        let job_id = item.job_id;
        self.process(item).await;
        Ok(Some(job_id))
    }

    async fn process(&self, item: SyncQueueItem) {
        let job_id = item.job_id;
        if let Err(e) = self.execute(item.tenant_id, job_id).await {
            tracing::error!(job_id, error = %e, "Sync job execution error");
        }
        if let Err(e) = self.queue.ack(item.id).await {
            tracing::error!(job_id, queue_item_id = item.id, error = %e, "Failed to ack queue item");
        }
    }

    async fn execute(&self, tenant_id: DbId, job_id: DbId) -> CoreResult<()> {
        let Some(job) = self.jobs.find_job(tenant_id, job_id).await? else {
            tracing::warn!(job_id, "Queued job no longer exists");
            return Ok(());
        };

        match job.status() {
            Some(SyncJobStatus::Queued) => {}
            // Enqueued but the orchestrator never got to mark it queued.
            Some(SyncJobStatus::Pending) => {
                self.jobs
                    .transition_job(tenant_id, job_id, SyncJobStatus::Pending, SyncJobStatus::Queued)
                    .await?;
            }
            status => {
                tracing::info!(
                    job_id,
                    status = status.map(SyncJobStatus::name).unwrap_or("unknown"),
                    "Skipping job that is not queued",
                );
                return Ok(());
            }
        }

        if !self
            .jobs
            .transition_job(tenant_id, job_id, SyncJobStatus::Queued, SyncJobStatus::Running)
            .await?
        {
            tracing::info!(job_id, "Job cancelled before start");
            return Ok(());
        }

        tracing::info!(job_id, tenant_id = job.tenant_id, "Sync job started");
        self.publish(&job, EVENT_JOB_STARTED, json!({}));

        match self.run_job(&job).await {
            Ok(RunOutcome::Finished(totals)) => {
                if self
                    .jobs
                    .finish_job(tenant_id, job_id, SyncJobStatus::Completed, None)
                    .await?
                {
                    tracing::info!(
                        job_id,
                        processed = totals.processed,
                        failed = totals.failed,
                        "Sync job completed",
                    );
                    self.publish(
                        &job,
                        EVENT_JOB_COMPLETED,
                        json!({"records_processed": totals.processed, "records_failed": totals.failed}),
                    );
                }
            }
            Ok(RunOutcome::Cancelled) => {
                tracing::info!(job_id, "Sync job stopped after cancellation");
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id, error = %message, "Sync job failed");
                if self
                    .jobs
                    .finish_job(tenant_id, job_id, SyncJobStatus::Failed, Some(&message))
                    .await?
                {
                    self.publish(&job, EVENT_JOB_FAILED, json!({"error": message}));
                }
            }
        }
        Ok(())
    }

    async fn run_job(&self, job: &SyncJob) -> CoreResult<RunOutcome> {
        let integration = self
            .jobs
            .find_integration(job.tenant_id, job.integration_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Integration",
                id: job.integration_id,
            })?;
        let mode = SyncMode::parse(&job.sync_mode)?;
        let connector = self.connectors.get(&integration).await?;
        let renames = field_renames(&integration);

        let mut totals = SyncTotals::default();
        for raw in &job.entity_types {
            let kind: EntityKind = raw.parse()?;
            if mode.pulls() {
                let flow = self
                    .pull(job, &integration.system, kind, connector.as_ref(), &renames, &mut totals)
                    .await?;
                if matches!(flow, Flow::Cancelled) {
                    return Ok(RunOutcome::Cancelled);
                }
            }
            if mode.pushes() {
                let flow = self
                    .push(job, &integration.system, kind, connector.as_ref(), &mut totals)
                    .await?;
                if matches!(flow, Flow::Cancelled) {
                    return Ok(RunOutcome::Cancelled);
                }
            }
        }
        Ok(RunOutcome::Finished(totals))
    }

    async fn pull(
        &self,
        job: &SyncJob,
        system: &str,
        kind: EntityKind,
        connector: &dyn Connector,
        renames: &HashMap<String, String>,
        totals: &mut SyncTotals,
    ) -> CoreResult<Flow> {
        let mut cursor: Option<String> = None;
        loop {
            if self.is_cancelled(job).await? {
                return Ok(Flow::Cancelled);
            }

            let page = connector.fetch_entities(kind, cursor.as_deref()).await?;
            let (mut processed, mut failed) = (0, 0);
            for record in &page.records {
                let canonical = self
                    .normalizer
                    .to_canonical(system, kind, record, renames)
                    .and_then(|c| canonical_key(kind, &c).map(|key| (key, c)));
                match canonical {
                    Ok((key, data)) => {
                        self.canonical
                            .upsert(job.tenant_id, kind.as_str(), &key, &data)
                            .await?;
                        processed += 1;
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(job_id = job.id, entity = %kind, error = %e, "Record rejected");
                    }
                }
            }

            self.jobs
                .add_job_progress(job.tenant_id, job.id, processed, failed)
                .await?;
            totals.add(processed, failed);
            tracing::debug!(job_id = job.id, entity = %kind, processed, failed, "Page pulled");

            match page.next_cursor {
                Some(next) if !page.records.is_empty() => cursor = Some(next),
                _ => return Ok(Flow::Continue),
            }
        }
    }

    async fn push(
        &self,
        job: &SyncJob,
        system: &str,
        kind: EntityKind,
        connector: &dyn Connector,
        totals: &mut SyncTotals,
    ) -> CoreResult<Flow> {
        let batch_size = usize::try_from(job.batch_size).unwrap_or(1).max(1);
        let mut after: Option<String> = None;
        loop {
            if self.is_cancelled(job).await? {
                return Ok(Flow::Cancelled);
            }

            let rows = self
                .canonical
                .list(job.tenant_id, kind.as_str(), after.as_deref(), batch_size)
                .await?;
            let Some(last) = rows.last() else {
                return Ok(Flow::Continue);
            };
            after = Some(last.record_key.clone());

            let mut failed = 0;
            let mut batch = Vec::with_capacity(rows.len());
            for row in &rows {
                match self.normalizer.from_canonical(system, kind, &row.data) {
                    Ok(shaped) => batch.push(shaped),
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(
                            job_id = job.id,
                            entity = %kind,
                            record_key = %row.record_key,
                            error = %e,
                            "Record could not be shaped for push",
                        );
                    }
                }
            }

            let mut processed = 0;
            if !batch.is_empty() {
                let outcome = connector.push_entities(kind, &batch).await?;
                for rejected in &outcome.rejected {
                    tracing::warn!(
                        job_id = job.id,
                        entity = %kind,
                        index = rejected.index,
                        error = %rejected.error,
                        "Record rejected by remote system",
                    );
                }
                processed = count(outcome.accepted);
                failed += count(outcome.rejected.len());
            }

            self.jobs
                .add_job_progress(job.tenant_id, job.id, processed, failed)
                .await?;
            totals.add(processed, failed);

            if rows.len() < batch_size {
                return Ok(Flow::Continue);
            }
        }
    }

    async fn is_cancelled(&self, job: &SyncJob) -> CoreResult<bool> {
        let job = self.jobs.find_job(job.tenant_id, job.id).await?;
        Ok(job.and_then(|j| j.status()) != Some(SyncJobStatus::Running))
    }

    fn publish(&self, job: &SyncJob, event_type: &str, payload: Value) {
        self.events.publish(
            SyncEvent::new(event_type)
                .with_source(SYNC_JOB_ENTITY, job.id)
                .with_tenant(job.tenant_id)
                .with_payload(payload),
        );
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Integration-level field renames; absent or malformed renames mean none.
fn field_renames(integration: &Integration) -> HashMap<String, String> {
    integration
        .config
        .get("field_renames")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}
