//! Text sensors for the bridge and each alarm unit

use serde_json::json;
use wisafe_bridge::{BridgeSnapshot, DeviceSnapshot};
use wisafe_core::STATUS_UNKNOWN;

use crate::description::{EntityDescription, Platform, RenderedEntity};
use crate::device_info::DeviceInfo;

pub fn battery_icon(status: &str) -> &'static str {
    match status.to_lowercase().as_str() {
        "ok" | "good" => "mdi:battery",
        "low" => "mdi:battery-low",
        _ => "mdi:battery-unknown",
    }
}

pub fn base_icon(status: &str) -> &'static str {
    match status.to_lowercase().as_str() {
        "attached" | "on_base" => "mdi:home",
        "removed" | "off_base" => "mdi:home-alert",
        _ => "mdi:home-outline",
    }
}

pub fn event_icon(event: Option<&str>) -> &'static str {
    match event {
        Some(event) if event.contains("EMERGENCY") => "mdi:bell-alert",
        _ => "mdi:bell-outline",
    }
}

pub fn test_result_icon(result: Option<&str>) -> &'static str {
    let result = result.map(str::to_lowercase).unwrap_or_default();
    if result.contains("pass") {
        "mdi:clipboard-check"
    } else if result.contains("fail") {
        "mdi:clipboard-alert"
    } else {
        "mdi:clipboard-outline"
    }
}

fn text_or_unknown(value: Option<&str>) -> String {
    value.unwrap_or(STATUS_UNKNOWN).to_string()
}

pub fn bridge_sensors(snapshot: &BridgeSnapshot) -> Vec<RenderedEntity> {
    let bridge = DeviceInfo::bridge;
    vec![
        EntityDescription::new(Platform::Sensor, "bridge_status", "Status", bridge())
            .with_state(if snapshot.bridge_online { "Online" } else { "Offline" })
            .icon(if snapshot.bridge_online {
                "mdi:bridge"
            } else {
                "mdi:bridge-off"
            }),
        EntityDescription::new(Platform::Sensor, "bridge_message", "Last Message", bridge())
            .with_state(text_or_unknown(snapshot.last_message.as_deref()))
            .icon("mdi:message-text"),
        EntityDescription::new(Platform::Sensor, "bridge_raw", "Raw Data", bridge())
            .disabled_by_default()
            .with_state(text_or_unknown(snapshot.raw_data.as_deref()))
            .icon("mdi:code-json"),
    ]
}

pub fn device_sensors(device_id: &str, device: &DeviceSnapshot) -> Vec<RenderedEntity> {
    let info = || DeviceInfo::alarm(device_id, device);
    let unique = |suffix: &str| format!("{}_{}", device_id, suffix);

    let last_seen = device
        .last_seen
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| STATUS_UNKNOWN.to_string());

    vec![
        EntityDescription::new(Platform::Sensor, unique("battery"), "Battery", info())
            .with_state(device.battery_status.clone())
            .icon(battery_icon(&device.battery_status)),
        EntityDescription::new(Platform::Sensor, unique("base"), "Base Status", info())
            .with_state(device.base_status.clone())
            .icon(base_icon(&device.base_status)),
        EntityDescription::new(Platform::Sensor, unique("event"), "Last Event", info())
            .with_state(text_or_unknown(device.last_event.as_deref()))
            .icon(event_icon(device.last_event.as_deref())),
        EntityDescription::new(Platform::Sensor, unique("test"), "Test Result", info())
            .with_state(text_or_unknown(device.last_test_result.as_deref()))
            .icon(test_result_icon(device.last_test_result.as_deref())),
        EntityDescription::new(Platform::Sensor, unique("last_seen"), "Last Seen", info())
            .device_class("timestamp")
            .with_state(last_seen)
            .icon("mdi:clock-outline"),
    ]
    .into_iter()
    .map(|entity| entity.with_attribute("device_id", json!(device_id)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icons() {
        assert_eq!(battery_icon("OK"), "mdi:battery");
        assert_eq!(battery_icon("low"), "mdi:battery-low");
        assert_eq!(battery_icon("unknown"), "mdi:battery-unknown");

        assert_eq!(base_icon("on_base"), "mdi:home");
        assert_eq!(base_icon("Removed"), "mdi:home-alert");
        assert_eq!(base_icon("?"), "mdi:home-outline");

        assert_eq!(event_icon(Some("EMERGENCY: FIRE")), "mdi:bell-alert");
        // case sensitive, as the bridge writes it
        assert_eq!(event_icon(Some("emergency: fire")), "mdi:bell-outline");
        assert_eq!(event_icon(None), "mdi:bell-outline");

        assert_eq!(test_result_icon(Some("SMOKE: PASS")), "mdi:clipboard-check");
        assert_eq!(test_result_icon(Some("CO: Failed")), "mdi:clipboard-alert");
        assert_eq!(test_result_icon(None), "mdi:clipboard-outline");
    }

    #[test]
    fn test_bridge_status_follows_liveness() {
        let mut snapshot = BridgeSnapshot::default();
        let sensors = bridge_sensors(&snapshot);
        assert_eq!(sensors[0].state, "Offline");
        assert_eq!(sensors[0].icon, Some("mdi:bridge-off"));
        assert_eq!(sensors[1].state, "unknown");
        assert!(!sensors[2].description.enabled_by_default);

        snapshot.bridge_online = true;
        snapshot.last_message = Some(r#"{"type":"heartbeat"}"#.to_string());
        let sensors = bridge_sensors(&snapshot);
        assert_eq!(sensors[0].state, "Online");
        assert_eq!(sensors[1].state, r#"{"type":"heartbeat"}"#);
    }
}
