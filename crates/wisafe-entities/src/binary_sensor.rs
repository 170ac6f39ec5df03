//! On/off sensors: connectivity, problem, smoke and carbon monoxide

use serde_json::json;
use wisafe_bridge::{BridgeSnapshot, DeviceSnapshot};
use wisafe_core::DeviceCategory;

use crate::description::{on_off, EntityDescription, Platform, RenderedEntity};
use crate::device_info::DeviceInfo;

/// Units that get a Smoke sensor; unresolved units get both
pub fn has_smoke_sensor(category: Option<DeviceCategory>) -> bool {
    matches!(
        category,
        None | Some(DeviceCategory::Smoke | DeviceCategory::Heat | DeviceCategory::Combined)
    )
}

pub fn has_co_sensor(category: Option<DeviceCategory>) -> bool {
    matches!(category, None | Some(DeviceCategory::Co))
}

pub fn bridge_binary_sensors(snapshot: &BridgeSnapshot) -> Vec<RenderedEntity> {
    vec![EntityDescription::new(
        Platform::BinarySensor,
        "bridge_connectivity",
        "Connected",
        DeviceInfo::bridge(),
    )
    .device_class("connectivity")
    .with_state(on_off(snapshot.bridge_online))]
}

pub fn device_binary_sensors(device_id: &str, device: &DeviceSnapshot) -> Vec<RenderedEntity> {
    let info = || DeviceInfo::alarm(device_id, device);
    let unique = |suffix: &str| format!("{}_{}", device_id, suffix);

    let problems: Vec<&str> = device.problems.iter().map(|p| p.label()).collect();

    let mut entities = vec![
        EntityDescription::new(Platform::BinarySensor, unique("connectivity"), "Connected", info())
            .device_class("connectivity")
            .with_state(on_off(device.is_online)),
        EntityDescription::new(Platform::BinarySensor, unique("problem"), "Problem", info())
            .device_class("problem")
            .with_state(on_off(device.has_problem()))
            .with_attribute("problems", json!(problems)),
    ];

    if has_smoke_sensor(device.device_type) {
        entities.push(
            EntityDescription::new(Platform::BinarySensor, unique("smoke"), "Smoke", info())
                .device_class("smoke")
                .with_state(on_off(device.smoke_active)),
        );
    }
    if has_co_sensor(device.device_type) {
        entities.push(
            EntityDescription::new(Platform::BinarySensor, unique("co"), "Carbon Monoxide", info())
                .device_class("carbon_monoxide")
                .with_state(on_off(device.co_active)),
        );
    }

    entities
        .into_iter()
        .map(|entity| entity.with_attribute("device_id", json!(device_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_core::Problem;

    fn device(category: Option<DeviceCategory>) -> DeviceSnapshot {
        DeviceSnapshot {
            name: None,
            model_id: None,
            device_type: category,
            location: None,
            battery_status: "low".to_string(),
            base_status: "removed".to_string(),
            last_event: Some("CARBON MONOXIDE EMERGENCY".to_string()),
            last_test_result: None,
            last_seen: None,
            is_online: false,
            smoke_active: false,
            co_active: true,
            problems: vec![Problem::LowBattery, Problem::OffBase],
        }
    }

    fn names(entities: &[RenderedEntity]) -> Vec<&str> {
        entities.iter().map(|e| e.description.name).collect()
    }

    #[test]
    fn test_sensors_by_category() {
        let all = ["Connected", "Problem", "Smoke", "Carbon Monoxide"];
        assert_eq!(names(&device_binary_sensors("D", &device(None))), all);
        assert_eq!(
            names(&device_binary_sensors("D", &device(Some(DeviceCategory::Co)))),
            ["Connected", "Problem", "Carbon Monoxide"]
        );
        for category in [DeviceCategory::Smoke, DeviceCategory::Heat, DeviceCategory::Combined] {
            assert_eq!(
                names(&device_binary_sensors("D", &device(Some(category)))),
                ["Connected", "Problem", "Smoke"]
            );
        }
        assert_eq!(
            names(&device_binary_sensors("D", &device(Some(DeviceCategory::Strobe)))),
            ["Connected", "Problem"]
        );
    }

    #[test]
    fn test_states_and_problem_labels() {
        let entities = device_binary_sensors("D9", &device(None));
        assert_eq!(entities[0].state, "off");
        assert_eq!(entities[1].state, "on");
        assert_eq!(entities[1].extra["problems"], json!(["Low Battery", "Off Base"]));
        assert_eq!(entities[2].state, "off");
        assert_eq!(entities[3].state, "on");
        assert_eq!(
            entities[3].entity_id().unwrap().to_string(),
            "binary_sensor.wisafe2_d9_co"
        );
        assert_eq!(entities[3].description.friendly_name(), "WiSafe2 Alarm D9 Carbon Monoxide");
    }

    #[test]
    fn test_bridge_connectivity() {
        let mut snapshot = BridgeSnapshot::default();
        assert_eq!(bridge_binary_sensors(&snapshot)[0].state, "off");
        snapshot.bridge_online = true;
        assert_eq!(bridge_binary_sensors(&snapshot)[0].state, "on");
    }
}
