//! Entity descriptions and rendered entity states

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use wisafe_core::{slugify, EntityId, EntityIdError, DOMAIN};

use crate::device_info::DeviceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Sensor,
    BinarySensor,
    Button,
}

impl Platform {
    pub fn domain(&self) -> &'static str {
        match self {
            Platform::Sensor => "sensor",
            Platform::BinarySensor => "binary_sensor",
            Platform::Button => "button",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.domain())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Config => "config",
            EntityCategory::Diagnostic => "diagnostic",
        }
    }
}

/// Static part of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescription {
    pub unique_id: String,
    pub platform: Platform,
    pub name: &'static str,
    pub device_class: Option<&'static str>,
    pub entity_category: Option<EntityCategory>,
    pub enabled_by_default: bool,
    pub device: DeviceInfo,
}

impl EntityDescription {
    pub fn new(
        platform: Platform,
        unique_id: impl Into<String>,
        name: &'static str,
        device: DeviceInfo,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            platform,
            name,
            device_class: None,
            entity_category: None,
            enabled_by_default: true,
            device,
        }
    }

    pub fn device_class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub fn category(mut self, category: EntityCategory) -> Self {
        self.entity_category = Some(category);
        self
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    /// `<platform>.wisafe2_<unique id>`, slugified
    pub fn entity_id(&self) -> Result<EntityId, EntityIdError> {
        EntityId::new(
            self.platform.domain(),
            slugify(&format!("{}_{}", DOMAIN, self.unique_id)),
        )
    }

    /// Device name followed by entity name
    pub fn friendly_name(&self) -> String {
        format!("{} {}", self.device.name, self.name)
    }

    pub fn with_state(self, state: impl Into<String>) -> RenderedEntity {
        RenderedEntity {
            description: self,
            state: state.into(),
            icon: None,
            extra: HashMap::new(),
        }
    }
}

/// An entity with its current state, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEntity {
    pub description: EntityDescription,
    pub state: String,
    pub icon: Option<&'static str>,
    pub extra: HashMap<String, Value>,
}

impl RenderedEntity {
    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn entity_id(&self) -> Result<EntityId, EntityIdError> {
        self.description.entity_id()
    }

    pub fn attributes(&self) -> HashMap<String, Value> {
        let d = &self.description;
        let mut attributes = self.extra.clone();
        attributes.insert("friendly_name".to_string(), json!(d.friendly_name()));
        if let Some(icon) = self.icon {
            attributes.insert("icon".to_string(), json!(icon));
        }
        attributes.insert("unique_id".to_string(), json!(d.unique_id));
        attributes.insert("device".to_string(), json!(d.device));
        if let Some(device_class) = d.device_class {
            attributes.insert("device_class".to_string(), json!(device_class));
        }
        if let Some(category) = d.entity_category {
            attributes.insert("entity_category".to_string(), json!(category.as_str()));
        }
        attributes
    }
}

/// Binary sensor state text
pub(crate) fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
