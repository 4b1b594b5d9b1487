//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Shared via `Arc<EventBus>` by the orchestrator, the job runner and the
//! bulk engine. Publishing never blocks and never fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use syncbridge_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// SyncEvent
// ---------------------------------------------------------------------------

/// A lifecycle event for a sync job or bulk operation.
///
/// Built with [`SyncEvent::new`] plus [`with_source`](SyncEvent::with_source),
/// [`with_tenant`](SyncEvent::with_tenant),
/// [`with_actor`](SyncEvent::with_actor) and
/// [`with_payload`](SyncEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Colon-separated event name, e.g. `"job:created"`.
    pub event_type: String,

    /// Source entity kind (`"sync_job"`, `"bulk_operation"`).
    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<DbId>,

    pub tenant_id: Option<DbId>,

    pub actor_user_id: Option<DbId>,

    /// Event-specific data (counts, error message, ...).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            tenant_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_tenant(mut self, tenant_id: DbId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: SyncEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
