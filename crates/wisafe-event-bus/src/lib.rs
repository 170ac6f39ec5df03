//! Event bus for WiSafe2 notifications
//!
//! The bridge announces emergencies, missing devices and entity state
//! changes here. Each event type gets its own broadcast channel, created on
//! first subscription; a separate channel receives every event.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};
use wisafe_core::{Context, Event, EventData, EventType};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type RawEvent = Event<serde_json::Value>;

pub struct EventBus {
    /// Per-type senders, created lazily by `subscribe`
    channels: DashMap<EventType, broadcast::Sender<RawEvent>>,
    /// Receives every fired event
    all: broadcast::Sender<RawEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            all,
            capacity,
        }
    }

    /// Subscribe to one event type
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<RawEvent> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        self.channels
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to one event type with its payload decoded
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> broadcast::Receiver<RawEvent> {
        self.all.subscribe()
    }

    /// Deliver an event to its type's subscribers and to match-all subscribers
    ///
    /// Returns how many receivers got it. Zero receivers is not an error.
    pub fn fire(&self, event: RawEvent) -> usize {
        debug!(event_type = %event.event_type, "Firing event");

        let mut delivered = 0;
        if let Some(sender) = self.channels.get(&event.event_type) {
            delivered += sender.send(event.clone()).unwrap_or(0);
        }
        delivered + self.all.send(event).unwrap_or(0)
    }

    /// Serialize a typed payload and fire it under its own event type
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) -> usize {
        let event = Event::typed(data, context)
            .map(|data| serde_json::to_value(&data).unwrap_or_default());
        self.fire(event)
    }

    /// Number of event types that have had a subscriber
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that decodes payloads into `T`
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<RawEvent>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<RawEvent>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Wait for the next event whose payload decodes as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(event.map(|_| data));
            }
        }
    }

    /// Take the next already-delivered event without waiting
    pub fn try_recv(&mut self) -> Result<Event<T>, broadcast::error::TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(event.map(|_| data));
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wisafe_core::events::{DeviceMissingData, EmergencyData, EMERGENCY};

    fn emergency(device_id: &str) -> EmergencyData {
        EmergencyData {
            device_id: device_id.to_string(),
            event_type: "FIRE".to_string(),
            device_name: Some("FP2620W2".to_string()),
            location: Some("Hall".to_string()),
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EMERGENCY);

        bus.fire(Event::new(EMERGENCY, json!({"device_id": "D1"}), Context::new()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), EMERGENCY);
        assert_eq!(received.data["device_id"], "D1");
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<EmergencyData>();

        bus.fire_typed(emergency("D1"), Context::new());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data, emergency("D1"));
    }

    #[tokio::test]
    async fn test_match_all_sees_every_type() {
        let bus = EventBus::new();
        let mut all = bus.subscribe_all();

        bus.fire_typed(emergency("D1"), Context::new());
        bus.fire_typed(
            DeviceMissingData {
                device_id: "D2".to_string(),
                device_name: None,
            },
            Context::new(),
        );

        assert_eq!(all.recv().await.unwrap().event_type.as_str(), "wisafe2_emergency");
        assert_eq!(
            all.recv().await.unwrap().event_type.as_str(),
            "wisafe2_device_missing"
        );
    }

    #[test]
    fn test_no_cross_type_delivery() {
        let bus = EventBus::new();
        let mut missing = bus.subscribe_typed::<DeviceMissingData>();

        bus.fire_typed(emergency("D1"), Context::new());
        assert!(missing.try_recv().is_err());
    }

    #[test]
    fn test_fire_without_receivers() {
        let bus = EventBus::new();
        assert_eq!(bus.fire_typed(emergency("D1"), Context::new()), 0);
        assert_eq!(bus.channel_count(), 0);
    }

    #[test]
    fn test_delivery_count() {
        let bus = EventBus::new();
        let _a = bus.subscribe(EMERGENCY);
        let _b = bus.subscribe(EMERGENCY);
        let _all = bus.subscribe_all();

        assert_eq!(bus.fire_typed(emergency("D1"), Context::new()), 3);
    }

    #[test]
    fn test_typed_recv_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<EmergencyData>();
        bus.fire_typed(emergency("D9"), Context::new());

        let event = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(event.data.device_id, "D9");
    }
}
