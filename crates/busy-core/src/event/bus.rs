//! Broadcast event bus for distributing `OrchestrationEvent` to subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.

use busy_types::event::OrchestrationEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for orchestration events.
///
/// Cloning the bus clones the sender, so every clone publishes into the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrchestrationEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: OrchestrationEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> OrchestrationEvent {
        OrchestrationEvent::StepStarted {
            process_name: "order-processing".to_string(),
            operation_name: "validate-order".to_string(),
            step_index: 0,
        }
    }

    #[tokio::test]
    async fn test_publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(sample_event());

        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received,
            OrchestrationEvent::StepStarted { step_index: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(OrchestrationEvent::ManualModeChanged { enabled: true });

        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received,
            OrchestrationEvent::ManualModeChanged { enabled: true }
        ));
    }

    #[test]
    fn test_publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.publish(sample_event());
        bus.publish(sample_event());
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bus = EventBus::new(0);
        let _rx = bus.subscribe();
        bus.publish(sample_event());
        assert_eq!(bus.receiver_count(), 1);
    }
}
