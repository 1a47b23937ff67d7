//! Event bus with typed pub/sub for Home Assistant
//!
//! Integrations publish on the bus (button presses, state writes) and the
//! rest of the hub subscribes by event type.

use dashmap::DashMap;
use ha_core::{Context, Event, EventData, EventType};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to events
///
/// Each event type gets its own broadcast channel, created lazily on first
/// subscription. A separate channel carries every event for MATCH_ALL
/// subscribers.
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    /// Sender for MATCH_ALL subscribers
    match_all_sender: broadcast::Sender<Event<serde_json::Value>>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to a typed event, receiving parsed data
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event<serde_json::Value>> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to the subscribers of its type and to MATCH_ALL
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // A send error only means nobody is listening right now
            let _ = sender.send(event.clone());
        }

        let _ = self.match_all_sender.send(event);
    }

    /// Serialize `data` and fire it under `event_type`
    ///
    /// Data that fails to serialize is logged and dropped; nothing is fired.
    pub fn fire_data<T: Serialize>(
        &self,
        event_type: impl Into<EventType>,
        data: &T,
        context: Context,
    ) {
        let event_type = event_type.into();
        match serde_json::to_value(data) {
            Ok(value) => self.fire(Event::new(event_type, value, context)),
            Err(err) => warn!(event_type = %event_type, "Dropping unserializable event: {}", err),
        }
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + Serialize>(&self, data: T, context: Context) {
        self.fire_data(T::event_type(), &data, context);
    }

    /// Get the number of event types with a channel
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose data parses as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                    context: event.context,
                });
            }
        }
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::events::StateChangedData;
    use ha_core::{EntityId, State};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("vantage_button_pressed");

        bus.fire(Event::new(
            "vantage_button_pressed",
            json!({"button_id": 12}),
            Context::new(),
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "vantage_button_pressed");
        assert_eq!(received.data["button_id"], 12);
    }

    #[tokio::test]
    async fn test_fire_data_serializes_payload() {
        #[derive(Serialize)]
        struct Payload {
            name: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            station: Option<u32>,
        }

        let bus = EventBus::new();
        let mut rx = bus.subscribe_all();
        bus.fire_data(
            "custom_event",
            &Payload {
                name: "Scene 1",
                station: None,
            },
            Context::new(),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data, json!({"name": "Scene 1"}));
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<StateChangedData>();

        let entity_id = EntityId::new("light", "kitchen").unwrap();
        let new_state = State::new(entity_id.clone(), "on", HashMap::new(), Context::new());

        bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state: None,
                new_state: Some(new_state),
            },
            Context::new(),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.entity_id.to_string(), "light.kitchen");
        assert!(received.data.new_state.is_some());
    }

    #[tokio::test]
    async fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("event_a");
        let mut rx_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({"type": "a"}), Context::new()));

        let received = rx_a.recv().await.unwrap();
        assert_eq!(received.data["type"], "a");
        assert!(rx_b.try_recv().is_err());
    }
}
