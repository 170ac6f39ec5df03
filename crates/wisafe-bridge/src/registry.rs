//! Alarm units known to the bridge, in discovery order

use indexmap::IndexMap;
use tracing::info;
use wisafe_core::Device;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: IndexMap<String, Device>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Device for `device_id`, created from `model_id` on first sight
    ///
    /// The model is only consulted when the device is new.
    pub fn get_or_discover(&mut self, device_id: &str, model_id: Option<&str>) -> &mut Device {
        self.devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                info!(device_id = %device_id, model_id = ?model_id, "Discovered new device");
                Device::new(device_id, model_id)
            })
    }

    /// Register a device ahead of its first message, or update one
    ///
    /// For an existing device only the given fields are overwritten; the
    /// category stays as first resolved.
    pub fn register(
        &mut self,
        device_id: &str,
        model_id: Option<&str>,
        name: Option<&str>,
        location: Option<&str>,
    ) -> &Device {
        let device = self
            .devices
            .entry(device_id.to_string())
            .and_modify(|device| {
                if let Some(model_id) = model_id {
                    device.model_id = Some(model_id.to_string());
                }
            })
            .or_insert_with(|| {
                info!(device_id = %device_id, model_id = ?model_id, "Registered device");
                Device::new(device_id, model_id)
            });

        if let Some(name) = name {
            device.name = Some(name.to_string());
        }
        if let Some(location) = location {
            device.location = Some(location.to_string());
        }
        device
    }

    /// Look up a device by id
    pub fn get(&self, device_id: &str) -> Option<&Device> {
        self.devices.get(device_id)
    }

    pub fn get_mut(&mut self, device_id: &str) -> Option<&mut Device> {
        self.devices.get_mut(device_id)
    }

    /// Whether the device has been seen or registered
    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Devices in the order they were first seen or registered
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
