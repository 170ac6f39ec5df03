//! Point-in-time view of the bridge and its devices

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use wisafe_core::{Device, DeviceCategory, Problem};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeSnapshot {
    /// Computed from `last_heartbeat` when the snapshot was taken
    pub bridge_online: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Last JSON frame, compact
    pub last_message: Option<String>,
    /// Last non-empty line as received
    pub raw_data: Option<String>,
    pub devices: IndexMap<String, DeviceSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub name: Option<String>,
    pub model_id: Option<String>,
    pub device_type: Option<DeviceCategory>,
    pub location: Option<String>,
    pub battery_status: String,
    pub base_status: String,
    pub last_event: Option<String>,
    pub last_test_result: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub smoke_active: bool,
    pub co_active: bool,
    pub problems: Vec<Problem>,
}

impl From<&Device> for DeviceSnapshot {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            model_id: device.model_id.clone(),
            device_type: device.category,
            location: device.location.clone(),
            battery_status: device.battery_status.clone(),
            base_status: device.base_status.clone(),
            last_event: device.last_event.clone(),
            last_test_result: device.last_test_result.clone(),
            last_seen: device.last_seen,
            is_online: device.is_online,
            smoke_active: device.smoke_active(),
            co_active: device.co_active(),
            problems: device.problems(),
        }
    }
}

impl DeviceSnapshot {
    pub fn has_problem(&self) -> bool {
        !self.problems.is_empty()
    }
}

impl BridgeSnapshot {
    pub fn device(&self, device_id: &str) -> Option<&DeviceSnapshot> {
        self.devices.get(device_id)
    }
}
