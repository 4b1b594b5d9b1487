pub mod bulk_operations;
pub mod integrations;
pub mod sync_jobs;
