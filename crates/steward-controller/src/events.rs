//! Event bus — one-to-many notification fan-out for cycle observers.
//!
//! Strictly fire-and-forget: publishing never blocks, never fails the
//! cycle, and carries no request/response traffic. Collaborator reads
//! go through the typed provider traits instead.

use tokio::sync::broadcast;
use tracing::trace;

use steward_core::ControlEvent;

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 256;

/// Broadcast bus for [`ControlEvent`] notifications.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ControlEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// A new receiver seeing events published from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. No subscribers is not an error.
    pub fn publish(&self, event: ControlEvent) {
        trace!(topic = event.topic(), "event published");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(ControlEvent::Error {
            message: "nobody listening".to_string(),
        });
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(ControlEvent::Error {
            message: "boom".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), "error");
    }

    #[tokio::test]
    async fn late_subscribers_miss_earlier_events() {
        let bus = EventBus::new();
        bus.publish(ControlEvent::Error {
            message: "early".to_string(),
        });

        let mut rx = bus.subscribe();
        bus.publish(ControlEvent::Error {
            message: "late".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ControlEvent::Error { message } if message == "late"));
    }
}
