//! Core types for the WiSafe2 bridge
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: alarm devices and their model table, inbound bridge frames,
//! outbound command codes, liveness rules, and the event/state value types
//! that carry results to listeners.

mod command;
mod context;
mod device;
mod entity_id;
mod event;
pub mod liveness;
mod message;
mod models;
mod state;

pub use command::{Command, UnknownCommand};
pub use context::Context;
pub use device::{Device, DeviceCategory, Problem};
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use message::{parse_line, BridgeMessage, FrameError, MessageType};
pub use models::{lookup_model, ModelInfo, DEVICE_MODELS};
pub use state::State;

/// Integration domain, used as the prefix for event types and entity ids
pub const DOMAIN: &str = "wisafe2";

/// Identifier of the singleton bridge device
pub const BRIDGE_DEVICE_ID: &str = "bridge";

/// Display name of the bridge device
pub const BRIDGE_NAME: &str = "WiSafe2 Bridge";

/// Default serial baud rate of the bridge firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Value used for any status field the bridge has not reported
pub const STATUS_UNKNOWN: &str = "unknown";

/// Event types and payloads broadcast by the bridge
pub mod events {
    use serde::{Deserialize, Serialize};

    use super::*;

    /// Fired once per `emergency` message
    pub const EMERGENCY: &str = "wisafe2_emergency";

    /// Fired once per `missing` message
    pub const DEVICE_MISSING: &str = "wisafe2_device_missing";

    /// Fired whenever an entity state is written
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for EMERGENCY events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EmergencyData {
        pub device_id: String,
        pub event_type: String,
        pub device_name: Option<String>,
        pub location: Option<String>,
    }

    impl EventData for EmergencyData {
        fn event_type() -> &'static str {
            EMERGENCY
        }
    }

    /// Data for DEVICE_MISSING events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DeviceMissingData {
        pub device_id: String,
        pub device_name: Option<String>,
    }

    impl EventData for DeviceMissingData {
        fn event_type() -> &'static str {
            DEVICE_MISSING
        }
    }

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
