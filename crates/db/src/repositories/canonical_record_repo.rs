//! Repository for the `canonical_records` table. Every query is scoped by
//! tenant and entity type.

use sqlx::PgPool;
use syncbridge_core::types::DbId;

use crate::models::canonical::CanonicalRecord;

const COLUMNS: &str = "tenant_id, entity_type, record_key, data, updated_at";

pub struct CanonicalRecordRepo;

impl CanonicalRecordRepo {
    pub async fn get(
        pool: &PgPool,
        tenant_id: DbId,
        entity_type: &str,
        record_key: &str,
    ) -> Result<Option<CanonicalRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM canonical_records \
             WHERE tenant_id = $1 AND entity_type = $2 AND record_key = $3"
        );
        sqlx::query_as::<_, CanonicalRecord>(&query)
            .bind(tenant_id)
            .bind(entity_type)
            .bind(record_key)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace a record, returning the previous data if any.
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: DbId,
        entity_type: &str,
        record_key: &str,
        data: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let previous: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT data FROM canonical_records \
             WHERE tenant_id = $1 AND entity_type = $2 AND record_key = $3 \
             FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(record_key)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO canonical_records (tenant_id, entity_type, record_key, data) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id, entity_type, record_key) \
             DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(record_key)
        .bind(data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous.map(|(data,)| data))
    }

    /// Delete a record, returning its data if it existed.
    pub async fn delete(
        pool: &PgPool,
        tenant_id: DbId,
        entity_type: &str,
        record_key: &str,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        let removed: Option<(serde_json::Value,)> = sqlx::query_as(
            "DELETE FROM canonical_records \
             WHERE tenant_id = $1 AND entity_type = $2 AND record_key = $3 \
             RETURNING data",
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(record_key)
        .fetch_optional(pool)
        .await?;
        Ok(removed.map(|(data,)| data))
    }

    /// Keyset page of records ordered by key, starting after `after_key`.
    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        entity_type: &str,
        after_key: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CanonicalRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM canonical_records \
             WHERE tenant_id = $1 AND entity_type = $2 \
               AND ($3::TEXT IS NULL OR record_key > $3) \
             ORDER BY record_key \
             LIMIT $4"
        );
        sqlx::query_as::<_, CanonicalRecord>(&query)
            .bind(tenant_id)
            .bind(entity_type)
            .bind(after_key)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
