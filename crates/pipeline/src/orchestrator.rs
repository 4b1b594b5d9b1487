//! Sync job creation, cancellation and lookup.
//!
//! Creating a job writes the job row and then the queue item. The two writes
//! are tracked by an [`EnqueueSaga`]; a failed enqueue deletes the job row
//! again so no orphaned `pending` job is left behind.

use std::sync::Arc;

use serde_json::json;
use syncbridge_core::error::{CoreError, CoreResult};
use syncbridge_core::job_events::{EVENT_JOB_CANCELLED, EVENT_JOB_CREATED};
use syncbridge_core::saga::EnqueueSaga;
use syncbridge_core::scheduling::SyncJobConfig;
use syncbridge_core::types::{CallerContext, DbId};
use syncbridge_db::models::status::SyncJobStatus;
use syncbridge_db::models::sync_job::{CreateSyncJob, SyncJob};
use syncbridge_events::{EventBus, SyncEvent};

use crate::store::{SyncJobStore, SyncQueue};

/// Source entity type attached to sync job events.
pub const SYNC_JOB_ENTITY: &str = "sync_job";

pub struct SyncOrchestrator {
    jobs: Arc<dyn SyncJobStore>,
    queue: Arc<dyn SyncQueue>,
    events: Arc<EventBus>,
}

impl SyncOrchestrator {
    pub fn new(jobs: Arc<dyn SyncJobStore>, queue: Arc<dyn SyncQueue>, events: Arc<EventBus>) -> Self {
        Self {
            jobs,
            queue,
            events,
        }
    }

    /// Create a sync job for one of the caller's integrations and queue it.
    ///
    /// The integration must belong to the caller's tenant; otherwise the
    /// request is refused before anything is written. When the enqueue step
    /// fails the job row is deleted and the enqueue error is returned.
    pub async fn create_sync_job(
        &self,
        caller: &CallerContext,
        config: &SyncJobConfig,
    ) -> CoreResult<SyncJob> {
        let (user_id, tenant_id) = caller.require_tenant()?;

        let integration = self
            .jobs
            .find_integration(tenant_id, config.integration_id)
            .await?;
        if integration.is_none() {
            tracing::warn!(
                tenant_id,
                integration_id = config.integration_id,
                "Sync job refused: integration not owned by tenant",
            );
            return Err(CoreError::Authorization(format!(
                "Integration {} is not accessible",
                config.integration_id
            )));
        }

        let kinds = config.validate()?;
        let input = CreateSyncJob {
            tenant_id,
            integration_id: config.integration_id,
            job_type: config.job_type.as_str().to_string(),
            entity_types: kinds.iter().map(|k| k.as_str().to_string()).collect(),
            sync_mode: config.sync_mode.as_str().to_string(),
            batch_size: config.batch_size,
            priority: config.priority.as_str().to_string(),
            created_by: user_id,
        };

        let mut job = self.jobs.create_job(&input).await?;
        let mut saga = EnqueueSaga::created(job.id);

        let priority = config.priority.queue_priority();
        if let Err(enqueue_err) = self.queue.enqueue(job.id, tenant_id, priority).await {
            self.compensate(&mut saga, tenant_id, &enqueue_err).await;
            return Err(enqueue_err);
        }
        saga.enqueued()?;

        // The queue item exists from here on; the runner lifts a job still
        // pending when it claims it, so a failed mark is not an error.
        saga.commit()?;
        match self
            .jobs
            .transition_job(tenant_id, job.id, SyncJobStatus::Pending, SyncJobStatus::Queued)
            .await
        {
            Ok(true) => job.status_id = SyncJobStatus::Queued.id(),
            Ok(false) => {
                // Already claimed by a runner.
                if let Ok(Some(current)) = self.jobs.find_job(tenant_id, job.id).await {
                    job = current;
                }
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "Failed to mark enqueued job queued");
            }
        }

        tracing::info!(
            job_id = job.id,
            tenant_id,
            integration_id = job.integration_id,
            priority,
            "Sync job queued",
        );
        self.events.publish(
            SyncEvent::new(EVENT_JOB_CREATED)
                .with_source(SYNC_JOB_ENTITY, job.id)
                .with_tenant(tenant_id)
                .with_actor(user_id)
                .with_payload(json!({
                    "integration_id": job.integration_id,
                    "entity_types": job.entity_types,
                    "sync_mode": job.sync_mode,
                    "priority": job.priority,
                })),
        );

        Ok(job)
    }

    /// Delete the job row after a failed enqueue. A failed delete is logged
    /// and never replaces the enqueue error.
    async fn compensate(&self, saga: &mut EnqueueSaga, tenant_id: DbId, cause: &CoreError) {
        if !saga.needs_compensation() {
            return;
        }
        let job_id = saga.job_id();
        match self.jobs.delete_job(tenant_id, job_id).await {
            Ok(_) => {
                if let Err(e) = saga.compensated() {
                    tracing::error!(job_id, error = %e, "Saga state out of step");
                }
                tracing::warn!(job_id, error = %cause, "Enqueue failed, job row removed");
            }
            Err(delete_err) => {
                let rollback = CoreError::Rollback(format!(
                    "Failed to remove job {job_id} after enqueue failure: {delete_err}"
                ));
                tracing::error!(job_id, error = %rollback, cause = %cause, "Compensation failed");
            }
        }
    }

    /// Cancel a job that has not reached a terminal status.
    ///
    /// A job already claimed by a runner stops at its next page boundary.
    pub async fn cancel_operation(&self, caller: &CallerContext, job_id: DbId) -> CoreResult<SyncJob> {
        let (user_id, tenant_id) = caller.require_tenant()?;
        let job = self.find_owned(tenant_id, job_id).await?;
        if job.is_terminal() {
            return Err(terminal_conflict(&job));
        }

        if !self.jobs.cancel_job(tenant_id, job_id).await? {
            // Finished between the read and the update.
            let job = self.find_owned(tenant_id, job_id).await?;
            return Err(terminal_conflict(&job));
        }

        tracing::info!(job_id, tenant_id, "Sync job cancelled");
        self.events.publish(
            SyncEvent::new(EVENT_JOB_CANCELLED)
                .with_source(SYNC_JOB_ENTITY, job_id)
                .with_tenant(tenant_id)
                .with_actor(user_id),
        );

        self.find_owned(tenant_id, job_id).await
    }

    pub async fn get_job(&self, caller: &CallerContext, job_id: DbId) -> CoreResult<SyncJob> {
        let (_, tenant_id) = caller.require_tenant()?;
        self.find_owned(tenant_id, job_id).await
    }

    async fn find_owned(&self, tenant_id: DbId, job_id: DbId) -> CoreResult<SyncJob> {
        self.jobs
            .find_job(tenant_id, job_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "SyncJob",
                id: job_id,
            })
    }
}

fn terminal_conflict(job: &SyncJob) -> CoreError {
    let status = job.status().map(SyncJobStatus::name).unwrap_or("unknown");
    CoreError::Conflict(format!("Sync job {} is already {status}", job.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStores;
    use assert_matches::assert_matches;
    use serde_json::Value;
    use syncbridge_core::scheduling::{JobType, SyncMode, SyncPriority};

    fn setup() -> (Arc<MemoryStores>, SyncOrchestrator, Arc<EventBus>) {
        let stores = Arc::new(MemoryStores::new());
        let events = Arc::new(EventBus::default());
        let orchestrator = SyncOrchestrator::new(stores.clone(), stores.clone(), events.clone());
        (stores, orchestrator, events)
    }

    fn config(integration_id: DbId) -> SyncJobConfig {
        SyncJobConfig {
            integration_id,
            job_type: JobType::Full,
            entity_types: vec!["products".into()],
            sync_mode: SyncMode::Pull,
            batch_size: 100,
            priority: SyncPriority::High,
        }
    }

    #[tokio::test]
    async fn create_queues_job_and_emits_event() {
        let (stores, orchestrator, events) = setup();
        let integration = stores.add_integration(1, "shopify", Value::Null);
        let mut rx = events.subscribe();

        let job = orchestrator
            .create_sync_job(&CallerContext::new(9, 1), &config(integration.id))
            .await
            .unwrap();

        assert_eq!(job.status(), Some(SyncJobStatus::Queued));
        assert_eq!(job.created_by, 9);
        assert_eq!(stores.queue_len(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_JOB_CREATED);
        assert_eq!(event.source_entity_id, Some(job.id));
        assert_eq!(event.payload["priority"], "high");
    }

    #[tokio::test]
    async fn foreign_integration_fails_closed() {
        let (stores, orchestrator, _) = setup();
        let other_tenant = stores.add_integration(2, "netsuite", Value::Null);

        let result = orchestrator
            .create_sync_job(&CallerContext::new(9, 1), &config(other_tenant.id))
            .await;

        assert_matches!(result, Err(CoreError::Authorization(_)));
        assert_eq!(stores.job_count(), 0);
    }

    #[tokio::test]
    async fn anonymous_caller_rejected() {
        let (_, orchestrator, _) = setup();
        assert_matches!(
            orchestrator
                .create_sync_job(&CallerContext::anonymous(), &config(1))
                .await,
            Err(CoreError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn invalid_config_writes_nothing() {
        let (stores, orchestrator, _) = setup();
        let integration = stores.add_integration(1, "shopify", Value::Null);
        let mut cfg = config(integration.id);
        cfg.batch_size = 0;

        assert_matches!(
            orchestrator.create_sync_job(&CallerContext::new(9, 1), &cfg).await,
            Err(CoreError::Validation(_))
        );
        assert_eq!(stores.job_count(), 0);
    }

    #[tokio::test]
    async fn failed_compensation_keeps_enqueue_error() {
        let (stores, orchestrator, _) = setup();
        let integration = stores.add_integration(1, "shopify", Value::Null);
        stores.fail_enqueue("queue offline");
        stores.fail_job_delete("disk full");

        let err = orchestrator
            .create_sync_job(&CallerContext::new(9, 1), &config(integration.id))
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::Connectivity(ref m) if m.contains("queue offline"));
        assert_eq!(stores.job_count(), 1);
    }

    #[tokio::test]
    async fn cancel_twice_conflicts() {
        let (stores, orchestrator, _) = setup();
        let integration = stores.add_integration(1, "shopify", Value::Null);
        let caller = CallerContext::new(9, 1);
        let job = orchestrator
            .create_sync_job(&caller, &config(integration.id))
            .await
            .unwrap();

        let cancelled = orchestrator.cancel_operation(&caller, job.id).await.unwrap();
        assert_eq!(cancelled.status(), Some(SyncJobStatus::Cancelled));

        assert_matches!(
            orchestrator.cancel_operation(&caller, job.id).await,
            Err(CoreError::Conflict(m)) if m.contains("cancelled")
        );
    }

    #[tokio::test]
    async fn jobs_are_tenant_scoped() {
        let (stores, orchestrator, _) = setup();
        let integration = stores.add_integration(1, "shopify", Value::Null);
        let job = orchestrator
            .create_sync_job(&CallerContext::new(9, 1), &config(integration.id))
            .await
            .unwrap();

        assert_matches!(
            orchestrator.get_job(&CallerContext::new(5, 2), job.id).await,
            Err(CoreError::NotFound { entity: "SyncJob", .. })
        );
    }
}
