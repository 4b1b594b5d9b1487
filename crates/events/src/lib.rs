//! SyncBridge lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`SyncEvent`]: the event envelope for sync job and bulk operation
//!   lifecycle changes.
//! - [`EventLogger`]: background subscriber writing every event to the
//!   tracing output.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, SyncEvent};
pub use logger::EventLogger;
