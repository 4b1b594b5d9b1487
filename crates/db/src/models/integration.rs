//! External system integrations owned by a tenant.

use serde::Serialize;
use sqlx::FromRow;
use syncbridge_core::types::{DbId, Timestamp};

/// A row from the `integrations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Integration {
    pub id: DbId,
    pub tenant_id: DbId,
    /// Lower-case system identifier, e.g. `netsuite` or `shopify`.
    pub system: String,
    pub name: String,
    /// Connection settings (`base_url`, credentials, page size, renames).
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
