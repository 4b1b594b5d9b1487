//! Repository for the `sync_jobs` table.
//!
//! Status changes are conditional updates (`WHERE status_id = ANY(...)`) so
//! concurrent cancel and run attempts cannot both win.

use sqlx::PgPool;
use syncbridge_core::scheduling::state_machine;
use syncbridge_core::types::DbId;

use crate::models::status::{StatusId, SyncJobStatus};
use crate::models::sync_job::{CreateSyncJob, SyncJob};

const COLUMNS: &str = "\
    id, tenant_id, integration_id, job_type, entity_types, sync_mode, \
    batch_size, priority, status_id, records_processed, records_failed, \
    error_message, created_by, created_at, started_at, completed_at, updated_at";

/// Non-terminal statuses a job may be cancelled from.
const CANCELLABLE: [StatusId; 3] = [
    state_machine::PENDING,
    state_machine::QUEUED,
    state_machine::RUNNING,
];

pub struct SyncJobRepo;

impl SyncJobRepo {
    /// Insert a new `pending` job.
    pub async fn create(pool: &PgPool, input: &CreateSyncJob) -> Result<SyncJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_jobs \
                 (tenant_id, integration_id, job_type, entity_types, sync_mode, \
                  batch_size, priority, status_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(input.tenant_id)
            .bind(input.integration_id)
            .bind(&input.job_type)
            .bind(&input.entity_types)
            .bind(&input.sync_mode)
            .bind(input.batch_size)
            .bind(&input.priority)
            .bind(SyncJobStatus::Pending.id())
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<SyncJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync_jobs WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a job row. Used only to compensate a failed enqueue.
    pub async fn delete(pool: &PgPool, tenant_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sync_jobs WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a job from `from` to `to`, stamping `started_at` on entering
    /// running. Returns `false` if the job was not in `from`.
    pub async fn transition(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        from: SyncJobStatus,
        to: SyncJobStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_jobs \
             SET status_id = $3, updated_at = NOW(), \
                 started_at = CASE WHEN $3 = $4 THEN NOW() ELSE started_at END \
             WHERE id = $1 AND status_id = $2 AND tenant_id = $5",
        )
        .bind(id)
        .bind(from.id())
        .bind(to.id())
        .bind(SyncJobStatus::Running.id())
        .bind(tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add to the processed/failed counters.
    pub async fn add_progress(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        processed: i32,
        failed: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_jobs \
             SET records_processed = records_processed + $3, \
                 records_failed = records_failed + $4, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(processed)
        .bind(failed)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finish a running job as completed or failed.
    pub async fn finish(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        status: SyncJobStatus,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 AND tenant_id = $5",
        )
        .bind(id)
        .bind(status.id())
        .bind(error)
        .bind(SyncJobStatus::Running.id())
        .bind(tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a job if it is not already in a terminal state.
    ///
    /// Returns `true` if the job was cancelled.
    pub async fn cancel(pool: &PgPool, tenant_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_jobs \
             SET status_id = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 AND status_id = ANY($4)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(SyncJobStatus::Cancelled.id())
        .bind(&CANCELLABLE[..])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
