//! Repositories for the `bulk_operations` and `bulk_operation_records`
//! tables.

use sqlx::{PgPool, Postgres, QueryBuilder};
use syncbridge_core::types::DbId;

use crate::models::bulk_operation::{
    BulkOperation, BulkOperationRecord, CreateBulkOperation, NewBulkRecord,
};
use crate::models::status::{BulkOperationStatus, StatusId};

const COLUMNS: &str = "\
    id, tenant_id, operation_type, entity_type, status_id, file_name, \
    total_records, chunk_size, max_concurrent, validate_only, rollback_on_error, \
    successful_records, failed_records, undo_data, error_message, created_by, \
    created_at, started_at, completed_at, rolled_back_at, updated_at";

const RECORD_COLUMNS: &str = "\
    id, operation_id, tenant_id, record_index, record_key, action, status, error, processed_at";

pub struct BulkOperationRepo;

impl BulkOperationRepo {
    /// Insert a new `pending` operation.
    pub async fn create(
        pool: &PgPool,
        input: &CreateBulkOperation,
    ) -> Result<BulkOperation, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_operations \
                 (tenant_id, operation_type, entity_type, status_id, file_name, total_records, \
                  chunk_size, max_concurrent, validate_only, rollback_on_error, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkOperation>(&query)
            .bind(input.tenant_id)
            .bind(&input.operation_type)
            .bind(&input.entity_type)
            .bind(BulkOperationStatus::Pending.id())
            .bind(&input.file_name)
            .bind(input.total_records)
            .bind(input.chunk_size)
            .bind(input.max_concurrent)
            .bind(input.validate_only)
            .bind(input.rollback_on_error)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<BulkOperation>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM bulk_operations WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, BulkOperation>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Move an operation to `to` if it is currently in one of `from`.
    ///
    /// Stamps `started_at` on processing, `completed_at` on any finished
    /// status and `rolled_back_at` on rolled back.
    pub async fn transition(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        from: &[BulkOperationStatus],
        to: BulkOperationStatus,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let from_ids: Vec<StatusId> = from.iter().map(|s| s.id()).collect();
        let result = sqlx::query(
            "UPDATE bulk_operations \
             SET status_id = $2, \
                 error_message = COALESCE($3, error_message), \
                 started_at = CASE WHEN $2 = $5 THEN NOW() ELSE started_at END, \
                 completed_at = CASE WHEN $2 IN ($6, $7, $8, $9) THEN NOW() ELSE completed_at END, \
                 rolled_back_at = CASE WHEN $2 = $10 THEN NOW() ELSE rolled_back_at END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($4) AND tenant_id = $11",
        )
        .bind(id)
        .bind(to.id())
        .bind(error)
        .bind(&from_ids)
        .bind(BulkOperationStatus::Processing.id())
        .bind(BulkOperationStatus::Completed.id())
        .bind(BulkOperationStatus::Partial.id())
        .bind(BulkOperationStatus::Failed.id())
        .bind(BulkOperationStatus::Cancelled.id())
        .bind(BulkOperationStatus::RolledBack.id())
        .bind(tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add per-chunk outcome counts.
    pub async fn add_counts(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        successful: i32,
        failed: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE bulk_operations \
             SET successful_records = successful_records + $3, \
                 failed_records = failed_records + $4, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(successful)
        .bind(failed)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Overwrite both counters, used after rollback rewrites outcomes.
    pub async fn set_counts(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        successful: i32,
        failed: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE bulk_operations \
             SET successful_records = $3, failed_records = $4, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(successful)
        .bind(failed)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn save_undo_data(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        undo_data: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE bulk_operations SET undo_data = $3, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(undo_data)
        .execute(pool)
        .await?;
        Ok(())
    }
}

pub struct BulkOperationRecordRepo;

impl BulkOperationRecordRepo {
    /// Insert the outcomes of one chunk in a single statement.
    pub async fn insert_many(
        pool: &PgPool,
        operation_id: DbId,
        tenant_id: DbId,
        records: &[NewBulkRecord],
    ) -> Result<(), sqlx::Error> {
        if records.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO bulk_operation_records \
                 (operation_id, tenant_id, record_index, record_key, action, status, error) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(operation_id)
                .push_bind(tenant_id)
                .push_bind(record.record_index)
                .push_bind(&record.record_key)
                .push_bind(&record.action)
                .push_bind(&record.status)
                .push_bind(&record.error);
        });
        builder.build().execute(pool).await?;
        Ok(())
    }

    /// Rewrite the outcome of already recorded rows.
    pub async fn mark_failed(
        pool: &PgPool,
        tenant_id: DbId,
        operation_id: DbId,
        record_indexes: &[i32],
        error: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_operation_records \
             SET status = 'failed', error = $3, processed_at = NOW() \
             WHERE operation_id = $1 AND record_index = ANY($2) AND tenant_id = $4",
        )
        .bind(operation_id)
        .bind(record_indexes)
        .bind(error)
        .bind(tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All outcomes of an operation ordered by row index.
    pub async fn list_for_operation(
        pool: &PgPool,
        tenant_id: DbId,
        operation_id: DbId,
    ) -> Result<Vec<BulkOperationRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM bulk_operation_records \
             WHERE operation_id = $1 AND tenant_id = $2 \
             ORDER BY record_index"
        );
        sqlx::query_as::<_, BulkOperationRecord>(&query)
            .bind(operation_id)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
