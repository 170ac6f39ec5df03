//! Line decoding and dispatch
//!
//! Every accepted frame is applied in order: heartbeat first, then the
//! generic status keys onto the sending device, then the handling specific
//! to the message type. Lines that are not JSON objects are logged at debug
//! and dropped without touching any state.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wisafe_core::events::{DeviceMissingData, EmergencyData};
use wisafe_core::{liveness, parse_line, BridgeMessage, Context, Device, MessageType};
use wisafe_event_bus::EventBus;

use crate::registry::DeviceRegistry;
use crate::snapshot::{BridgeSnapshot, DeviceSnapshot};

pub struct Dispatcher {
    registry: DeviceRegistry,
    /// The bridge itself; only its `last_seen` is maintained, liveness is
    /// computed on read
    bridge: Device,
    last_heartbeat: Option<DateTime<Utc>>,
    last_message: Option<String>,
    raw_data: Option<String>,
    event_bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            bridge: Device::bridge(),
            last_heartbeat: None,
            last_message: None,
            raw_data: None,
            event_bus,
        }
    }

    /// Remember the latest line as received, whatever it contains
    pub fn record_raw(&mut self, line: &str) {
        self.raw_data = Some(line.to_string());
    }

    /// Decode one trimmed line and apply it
    ///
    /// Returns the parsed object for update listeners, or `None` when the
    /// line was discarded.
    pub fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> Option<Value> {
        match parse_line(line) {
            Ok(msg) => {
                self.handle_message(&msg, now);
                Some(msg.into_value())
            }
            Err(e) => {
                debug!(line = %line, error = %e, "Discarding line");
                None
            }
        }
    }

    pub fn handle_message(&mut self, msg: &BridgeMessage, now: DateTime<Utc>) {
        self.last_message = Some(msg.to_json());

        if msg.is_heartbeat() {
            self.last_heartbeat = Some(now);
            self.bridge.last_seen = Some(now);
            debug!("Heartbeat received");
        }

        let Some(device_id) = msg.device_id() else {
            return;
        };

        let device = self
            .registry
            .get_or_discover(&device_id, msg.model_id().as_deref());
        device.apply_fields(msg, now);

        let Some(message_type) = msg.message_type() else {
            return;
        };

        match message_type {
            MessageType::Test => {
                let event_type = msg.text_or_unknown("event_type");
                let result = msg.text_or_unknown("result");
                info!(device_id = %device_id, event_type = %event_type, result = %result, "Test result");
                device.last_test_result = Some(format!("{}: {}", event_type, result));
            }
            MessageType::Emergency => {
                let event_type = msg.text_or_unknown("event_type");
                warn!(device_id = %device_id, event_type = %event_type, "EMERGENCY");
                device.last_event = Some(format!("EMERGENCY: {}", event_type));

                let data = EmergencyData {
                    device_id: device_id.clone(),
                    event_type,
                    device_name: device.name.clone(),
                    location: device.location.clone(),
                };
                self.event_bus.fire_typed(data, Context::new());
            }
            MessageType::Status => {
                device.battery_status = msg.text_or_unknown("battery");
                device.base_status = msg.text_or_unknown("base");
                debug!(
                    device_id = %device_id,
                    battery = %device.battery_status,
                    base = %device.base_status,
                    "Status"
                );
            }
            MessageType::Missing => {
                device.is_online = false;
                warn!(device_id = %device_id, "Device reported missing");

                let data = DeviceMissingData {
                    device_id: device_id.clone(),
                    device_name: device.name.clone(),
                };
                self.event_bus.fire_typed(data, Context::new());
            }
            MessageType::Heartbeat | MessageType::Other(_) => {}
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    /// The bridge as a device, with `is_online` computed for `now`
    pub fn bridge_device(&self, now: DateTime<Utc>) -> Device {
        Device {
            is_online: self.bridge_online(now),
            ..self.bridge.clone()
        }
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn raw_data(&self) -> Option<&str> {
        self.raw_data.as_deref()
    }

    pub fn bridge_online(&self, now: DateTime<Utc>) -> bool {
        liveness::bridge_online(self.last_heartbeat, now)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> BridgeSnapshot {
        BridgeSnapshot {
            bridge_online: self.bridge_online(now),
            last_heartbeat: self.last_heartbeat,
            last_message: self.last_message.clone(),
            raw_data: self.raw_data.clone(),
            devices: self
                .registry
                .iter()
                .map(|d| (d.device_id.clone(), DeviceSnapshot::from(d)))
                .collect(),
        }
    }
}
