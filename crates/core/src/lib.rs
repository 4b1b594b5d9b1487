//! Pure domain logic for SyncBridge: error taxonomy, schema mapping, system
//! transformers, scheduling and saga state machines, and bulk operation
//! planning. No I/O lives here.

pub mod bulk;
pub mod entity;
pub mod error;
pub mod job_events;
pub mod mapping;
pub mod saga;
pub mod scheduling;
pub mod transform;
pub mod types;
