//! Canonical store rows.

use serde::Serialize;
use sqlx::FromRow;
use syncbridge_core::types::{DbId, Timestamp};

/// A row from the `canonical_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CanonicalRecord {
    pub tenant_id: DbId,
    pub entity_type: String,
    pub record_key: String,
    pub data: serde_json::Value,
    pub updated_at: Timestamp,
}
