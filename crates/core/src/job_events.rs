//! Lifecycle event names published on the in-process event bus.
//!
//! Consumed by `syncbridge-events` subscribers and logged by the API and
//! worker.

/// Sync job row written and queued.
pub const EVENT_JOB_CREATED: &str = "job:created";

/// Worker picked the job up and moved it to running.
pub const EVENT_JOB_STARTED: &str = "job:started";

pub const EVENT_JOB_COMPLETED: &str = "job:completed";

pub const EVENT_JOB_FAILED: &str = "job:failed";

/// Job cancelled before or while running.
pub const EVENT_JOB_CANCELLED: &str = "job:cancelled";

/// Bulk operation accepted and processing started.
pub const EVENT_BULK_STARTED: &str = "bulk:started";

/// Bulk operation reached `completed`, `partial` or `failed`.
pub const EVENT_BULK_FINISHED: &str = "bulk:finished";

pub const EVENT_BULK_CANCELLED: &str = "bulk:cancelled";

/// Explicit rollback of a finished operation completed.
pub const EVENT_BULK_ROLLED_BACK: &str = "bulk:rolled_back";
