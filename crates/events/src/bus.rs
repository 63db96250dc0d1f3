//! Event bus implementation using tokio broadcast channels

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::types::GameEvent;
use crate::visibility::{should_deliver, Subscriber};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Fire-and-forget destination for game events.
///
/// `publish` must never fail the caller: delivery problems are the sink's to
/// absorb. `filter_for` is the access check every transport applies before
/// handing an event to a subscriber.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: GameEvent);

    fn filter_for(&self, subscriber: &Subscriber, event: &GameEvent) -> bool {
        should_deliver(subscriber, event)
    }
}

/// Sink that drops everything. Used when nobody is listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: GameEvent) {}
}

/// Event bus for publishing and subscribing to events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GameEvent>,
    /// Number of events published (for monitoring)
    event_count: Arc<AtomicUsize>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            event_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event.
    /// If there are no subscribers, returns 0 (the event is dropped).
    pub fn send(&self, event: GameEvent) -> usize {
        self.event_count.fetch_add(1, Ordering::Relaxed);
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to every event, unfiltered.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events `subscriber` is allowed to see.
    ///
    /// Events published before subscribing are not received. A receiver that
    /// falls behind skips the overwritten events.
    pub fn subscribe_for(
        &self,
        subscriber: Subscriber,
    ) -> impl Stream<Item = GameEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |received| match received {
            Ok(event) if should_deliver(&subscriber, &event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Event subscriber lagged, events dropped");
                None
            }
        })
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of events published
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: GameEvent) {
        self.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Visibility};
    use mafia_core::Role;
    use uuid::Uuid;

    fn event(visibility: Visibility, actor: Option<Uuid>) -> GameEvent {
        GameEvent::new(Uuid::new_v4(), Uuid::new_v4(), EventType::Speech, visibility)
            .with_actor(actor)
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let sent_event = event(Visibility::Public, None);
        let sent = bus.send(sent_event.clone());
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, sent_event.id);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();

        // No subscribers, event is dropped
        let sent = bus.send(event(Visibility::Public, None));
        assert_eq!(sent, 0);
        assert_eq!(bus.event_count(), 1);
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let bus = EventBus::new();
        let town_id = Uuid::new_v4();
        let mut town = Box::pin(bus.subscribe_for(Subscriber::player(town_id, Role::Doctor)));
        let mut viewer = Box::pin(bus.subscribe_for(Subscriber::viewer()));

        let mafia_only = event(Visibility::Mafia, Some(Uuid::new_v4()));
        let own_private = event(Visibility::Private, Some(town_id));
        let public = event(Visibility::Public, None);

        bus.publish(mafia_only.clone());
        bus.publish(own_private.clone());
        bus.publish(public.clone());

        assert_eq!(town.next().await.unwrap().id, own_private.id);
        assert_eq!(town.next().await.unwrap().id, public.id);

        assert_eq!(viewer.next().await.unwrap().id, mafia_only.id);
        assert_eq!(viewer.next().await.unwrap().id, own_private.id);
        assert_eq!(viewer.next().await.unwrap().id, public.id);
    }

    #[test]
    fn test_sink_filter_delegates_to_predicate() {
        let bus = EventBus::new();
        let mafia_event = event(Visibility::Mafia, None);

        assert!(bus.filter_for(&Subscriber::viewer(), &mafia_event));
        assert!(!bus.filter_for(
            &Subscriber::player(Uuid::new_v4(), Role::Townsperson),
            &mafia_event
        ));
        assert!(NullSink.filter_for(
            &Subscriber::player(Uuid::new_v4(), Role::Mafia),
            &mafia_event
        ));
    }

    #[test]
    fn test_clone() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus2.subscribe();
        assert_eq!(bus1.subscriber_count(), 1);
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
