//! Bulk operation models and DTOs.
//!
//! Maps to the `bulk_operations` and `bulk_operation_records` tables.

use serde::Serialize;
use sqlx::FromRow;
use syncbridge_core::types::{DbId, Timestamp};

use super::status::{BulkOperationStatus, StatusId};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `bulk_operations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkOperation {
    pub id: DbId,
    pub tenant_id: DbId,
    pub operation_type: String,
    pub entity_type: String,
    pub status_id: StatusId,
    pub file_name: String,
    pub total_records: i32,
    pub chunk_size: i32,
    pub max_concurrent: i32,
    pub validate_only: bool,
    pub rollback_on_error: bool,
    pub successful_records: i32,
    pub failed_records: i32,
    /// Inverse actions for every applied change, in application order.
    #[serde(skip)]
    pub undo_data: serde_json::Value,
    pub error_message: Option<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub rolled_back_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl BulkOperation {
    pub fn status(&self) -> Option<BulkOperationStatus> {
        BulkOperationStatus::from_id(self.status_id)
    }
}

/// A row from the `bulk_operation_records` table: the outcome of one input
/// row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkOperationRecord {
    pub id: DbId,
    pub operation_id: DbId,
    pub tenant_id: DbId,
    /// 1-based row index in the uploaded file.
    pub record_index: i32,
    pub record_key: Option<String>,
    pub action: String,
    pub status: String,
    pub error: Option<String>,
    pub processed_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for inserting a new bulk operation. Operations start `pending`.
#[derive(Debug, Clone)]
pub struct CreateBulkOperation {
    pub tenant_id: DbId,
    pub operation_type: String,
    pub entity_type: String,
    pub file_name: String,
    pub total_records: i32,
    pub chunk_size: i32,
    pub max_concurrent: i32,
    pub validate_only: bool,
    pub rollback_on_error: bool,
    pub created_by: DbId,
}

/// DTO for recording the outcome of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBulkRecord {
    pub record_index: i32,
    pub record_key: Option<String>,
    pub action: String,
    pub status: String,
    pub error: Option<String>,
}
