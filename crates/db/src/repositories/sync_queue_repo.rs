//! Repository for the `sync_queue` table.

use sqlx::PgPool;
use syncbridge_core::types::DbId;

use crate::models::sync_queue::SyncQueueItem;

const COLUMNS: &str = "id, job_id, tenant_id, priority, enqueued_at, claimed_at";

pub struct SyncQueueRepo;

impl SyncQueueRepo {
    pub async fn enqueue(
        pool: &PgPool,
        job_id: DbId,
        tenant_id: DbId,
        priority: i32,
    ) -> Result<SyncQueueItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_queue (job_id, tenant_id, priority) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncQueueItem>(&query)
            .bind(job_id)
            .bind(tenant_id)
            .bind(priority)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the highest-priority, oldest unclaimed item.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same item.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<SyncQueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE sync_queue SET claimed_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM sync_queue \
                 WHERE claimed_at IS NULL \
                 ORDER BY priority DESC, enqueued_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncQueueItem>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Remove a processed item.
    pub async fn ack(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sync_queue WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
