//! Repository for the `integrations` table.

use sqlx::PgPool;
use syncbridge_core::types::DbId;

use crate::models::integration::Integration;

const COLUMNS: &str = "id, tenant_id, system, name, config, is_active, created_at, updated_at";

pub struct IntegrationRepo;

impl IntegrationRepo {
    /// Find an integration owned by `tenant_id`. Another tenant's
    /// integration is indistinguishable from a missing one.
    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM integrations WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }
}
