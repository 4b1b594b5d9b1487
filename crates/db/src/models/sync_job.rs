//! Sync job models and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use syncbridge_core::types::{DbId, Timestamp};

use super::status::{StatusId, SyncJobStatus};

/// A row from the `sync_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncJob {
    pub id: DbId,
    pub tenant_id: DbId,
    pub integration_id: DbId,
    pub job_type: String,
    pub entity_types: Vec<String>,
    pub sync_mode: String,
    pub batch_size: i32,
    pub priority: String,
    pub status_id: StatusId,
    pub records_processed: i32,
    pub records_failed: i32,
    pub error_message: Option<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl SyncJob {
    pub fn status(&self) -> Option<SyncJobStatus> {
        SyncJobStatus::from_id(self.status_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(SyncJobStatus::is_terminal)
    }
}

/// DTO for inserting a new sync job. Jobs always start `pending`.
#[derive(Debug, Clone)]
pub struct CreateSyncJob {
    pub tenant_id: DbId,
    pub integration_id: DbId,
    pub job_type: String,
    pub entity_types: Vec<String>,
    pub sync_mode: String,
    pub batch_size: i32,
    pub priority: String,
    pub created_by: DbId,
}
