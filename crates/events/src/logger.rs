//! Background subscriber that writes lifecycle events to the log.

use tokio::sync::broadcast;

use crate::bus::SyncEvent;

/// Logs every event published on the bus until the bus is dropped.
pub struct EventLogger;

impl EventLogger {
    pub async fn run(mut receiver: broadcast::Receiver<SyncEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &SyncEvent) {
        tracing::info!(
            event_type = %event.event_type,
            source_entity_type = event.source_entity_type.as_deref().unwrap_or(""),
            source_entity_id = event.source_entity_id,
            tenant_id = event.tenant_id,
            actor_user_id = event.actor_user_id,
            payload = %event.payload,
            "Lifecycle event",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn exits_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLogger::run(bus.subscribe()));

        bus.publish(SyncEvent::new("job:started").with_source("sync_job", 1));
        drop(bus);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("logger should stop after the bus closes")
            .unwrap();
    }
}
