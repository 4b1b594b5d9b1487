//! Queue substrate rows.

use serde::Serialize;
use sqlx::FromRow;
use syncbridge_core::types::{DbId, Timestamp};

/// A row from the `sync_queue` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncQueueItem {
    pub id: DbId,
    pub job_id: DbId,
    pub tenant_id: DbId,
    /// Numeric priority (low=20, medium=50, high=80). Higher first.
    pub priority: i32,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
}
