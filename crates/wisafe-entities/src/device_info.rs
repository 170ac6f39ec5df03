//! Device metadata attached to every entity

use serde::Serialize;
use wisafe_bridge::DeviceSnapshot;
use wisafe_core::{BRIDGE_DEVICE_ID, BRIDGE_NAME, DOMAIN};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// `(domain, id)` pair identifying the device
    pub identifier: (String, String),
    pub manufacturer: &'static str,
    pub model: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<&'static str>,
    /// Identifier of the device this one is reached through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_device: Option<(String, String)>,
}

impl DeviceInfo {
    pub fn bridge() -> Self {
        Self {
            identifier: (DOMAIN.to_string(), BRIDGE_DEVICE_ID.to_string()),
            manufacturer: "FireAngel / DIY",
            model: BRIDGE_NAME.to_string(),
            name: BRIDGE_NAME.to_string(),
            sw_version: Some("1.0.0"),
            via_device: None,
        }
    }

    pub fn alarm(device_id: &str, device: &DeviceSnapshot) -> Self {
        Self {
            identifier: (DOMAIN.to_string(), device_id.to_string()),
            manufacturer: "FireAngel",
            model: device
                .name
                .clone()
                .unwrap_or_else(|| "Unknown Model".to_string()),
            name: device
                .name
                .clone()
                .unwrap_or_else(|| format!("WiSafe2 Alarm {}", device_id)),
            sw_version: None,
            via_device: Some((DOMAIN.to_string(), BRIDGE_DEVICE_ID.to_string())),
        }
    }
}
