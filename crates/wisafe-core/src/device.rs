//! Alarm devices relayed by the bridge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{lookup_model, BridgeMessage, STATUS_UNKNOWN};

/// Classification of an alarm unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Smoke,
    Heat,
    /// Carbon monoxide
    Co,
    Strobe,
    Siren,
    Water,
    Combined,
    Unknown,
    Bridge,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Heat => "heat",
            Self::Co => "co",
            Self::Strobe => "strobe",
            Self::Siren => "siren",
            Self::Water => "water",
            Self::Combined => "combined",
            Self::Unknown => "unknown",
            Self::Bridge => "bridge",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition that makes a device report a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Problem {
    LowBattery,
    OffBase,
    TestFailed,
}

impl Problem {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LowBattery => "Low Battery",
            Self::OffBase => "Off Base",
            Self::TestFailed => "Test Failed",
        }
    }
}

/// Last known state of one alarm unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub model_id: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub category: Option<DeviceCategory>,
    pub last_seen: Option<DateTime<Utc>>,
    pub battery_status: String,
    pub base_status: String,
    pub last_event: Option<String>,
    pub last_test_result: Option<String>,
    pub is_online: bool,
}

impl Device {
    /// Create a device, resolving name and category from the model table
    pub fn new(device_id: impl Into<String>, model_id: Option<&str>) -> Self {
        let model = model_id.and_then(lookup_model);
        Self {
            device_id: device_id.into(),
            model_id: model_id.map(str::to_string),
            name: model.map(|m| m.name.to_string()),
            location: None,
            category: model.map(|m| m.category),
            last_seen: None,
            battery_status: STATUS_UNKNOWN.to_string(),
            base_status: STATUS_UNKNOWN.to_string(),
            last_event: None,
            last_test_result: None,
            is_online: true,
        }
    }

    /// The bridge itself, modelled as a device
    pub fn bridge() -> Self {
        Self {
            name: Some(crate::BRIDGE_NAME.to_string()),
            category: Some(DeviceCategory::Bridge),
            ..Self::new(crate::BRIDGE_DEVICE_ID, None)
        }
    }

    /// Copy the generic status keys of a frame onto the device
    pub fn apply_fields(&mut self, msg: &BridgeMessage, now: DateTime<Utc>) {
        self.last_seen = Some(now);
        self.is_online = true;

        if let Some(battery) = msg.text("battery") {
            self.battery_status = battery;
        }
        if let Some(base) = msg.text("base") {
            self.base_status = base;
        }
        if let Some(event) = msg.text("event") {
            self.last_event = Some(event);
        }
        if let Some(result) = msg.text("test_result") {
            self.last_test_result = Some(result);
        }
    }

    /// Model or configured name, else a name built from the id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("WiSafe2 Alarm {}", self.device_id))
    }

    /// Last event reports a fire emergency
    pub fn smoke_active(&self) -> bool {
        self.event_contains("FIRE EMERGENCY")
    }

    /// Last event reports a carbon monoxide emergency
    pub fn co_active(&self) -> bool {
        self.event_contains("CARBON MONOXIDE EMERGENCY")
    }

    fn event_contains(&self, needle: &str) -> bool {
        self.last_event
            .as_deref()
            .is_some_and(|event| event.to_uppercase().contains(needle))
    }

    /// Battery reported as `low`, any case
    pub fn battery_low(&self) -> bool {
        self.battery_status.eq_ignore_ascii_case("low")
    }

    /// Detached from its mounting base
    pub fn off_base(&self) -> bool {
        let base = self.base_status.to_lowercase();
        base == "removed" || base == "off_base"
    }

    pub fn test_failed(&self) -> bool {
        self.last_test_result
            .as_deref()
            .is_some_and(|result| result.to_lowercase().contains("fail"))
    }

    /// Every problem currently reported: battery, then base, then test
    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        if self.battery_low() {
            problems.push(Problem::LowBattery);
        }
        if self.off_base() {
            problems.push(Problem::OffBase);
        }
        if self.test_failed() {
            problems.push(Problem::TestFailed);
        }
        problems
    }

    pub fn has_problem(&self) -> bool {
        self.battery_low() || self.off_base() || self.test_failed()
    }
}
