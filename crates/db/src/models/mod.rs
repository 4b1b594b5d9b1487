pub mod bulk_operation;
pub mod canonical;
pub mod integration;
pub mod status;
pub mod sync_job;
pub mod sync_queue;
