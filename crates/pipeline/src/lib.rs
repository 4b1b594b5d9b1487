//! Sync job orchestration and bulk operation processing.
//!
//! - [`store`]: persistence seams ([`SyncJobStore`], [`SyncQueue`],
//!   [`CanonicalStore`], [`BulkStore`]) with Postgres and in-memory adapters.
//! - [`normalize::Normalizer`]: external ↔ canonical record conversion.
//! - [`orchestrator::SyncOrchestrator`]: creates, cancels and looks up sync
//!   jobs; creation is a compensated two-write saga.
//! - [`runner::SyncJobRunner`]: drains the queue and executes jobs.
//! - [`bulk::BulkEngine`]: chunked CSV-driven bulk operations with
//!   rollback, cancellation and CSV reports.

pub mod bulk;
pub mod config;
pub mod normalize;
pub mod orchestrator;
pub mod runner;
pub mod store;

pub use bulk::{BulkEngine, BulkHandle};
pub use config::PipelineConfig;
pub use normalize::Normalizer;
pub use orchestrator::SyncOrchestrator;
pub use runner::SyncJobRunner;
pub use store::{BulkStore, CanonicalStore, MemoryStores, PgStores, SyncJobStore, SyncQueue};
