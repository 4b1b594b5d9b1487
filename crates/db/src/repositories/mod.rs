pub mod bulk_operation_repo;
pub mod canonical_record_repo;
pub mod integration_repo;
pub mod sync_job_repo;
pub mod sync_queue_repo;

pub use bulk_operation_repo::{BulkOperationRecordRepo, BulkOperationRepo};
pub use canonical_record_repo::CanonicalRecordRepo;
pub use integration_repo::IntegrationRepo;
pub use sync_job_repo::SyncJobRepo;
pub use sync_queue_repo::SyncQueueRepo;
