//! Bridge configuration schema and validation

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;
use wisafe_core::{lookup_model, DEFAULT_BAUD_RATE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Alarms registered before any message from them arrives
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub device_id: String,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub model: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

/// Ids and model codes may be written unquoted in YAML
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Unsigned(n) => n.to_string(),
            StringOrNumber::Signed(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

impl BridgeConfig {
    pub fn new(serial_port: impl Into<String>) -> Self {
        Self {
            serial_port: serial_port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            devices: Vec::new(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial_port.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "serial_port".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "baud_rate".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.device_id.trim().is_empty() {
                return Err(ConfigError::ValidationFailed {
                    message: "device_id must not be empty".to_string(),
                });
            }
            if !seen.insert(device.device_id.as_str()) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("duplicate device_id '{}'", device.device_id),
                });
            }
            if let Some(model) = &device.model {
                if model.len() != 4 || !model.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ConfigError::InvalidValue {
                        key: format!("devices.{}.model", device.device_id),
                        reason: format!("'{}' is not a four digit model code", model),
                    });
                }
            }
        }
        Ok(())
    }
}

impl DeviceConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            model: None,
            name: None,
            location: None,
        }
    }

    /// Whether the model code is in the known model table
    pub fn has_known_model(&self) -> bool {
        self.model.as_deref().and_then(lookup_model).is_some()
    }
}

/// Load, tag-process, deserialize and validate a config file
///
/// `secrets.yaml` is looked up in the same directory as `path`.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
    let path = path.as_ref();
    let config_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let file = path.file_name().map(Path::new).unwrap_or(path);

    let loader = YamlLoader::new(config_dir)?;
    let value = loader.load_file(file)?;
    let config = from_value(value, path)?;

    info!(
        path = %path.display(),
        serial_port = %config.serial_port,
        baud_rate = config.baud_rate,
        devices = config.devices.len(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Parse and validate configuration from a string using the given loader
pub fn parse_config(loader: &YamlLoader, content: &str) -> ConfigResult<BridgeConfig> {
    let source = Path::new("<string>");
    let value = loader.load_string(content, source)?;
    from_value(value, source)
}

fn from_value(value: serde_yaml::Value, path: &Path) -> ConfigResult<BridgeConfig> {
    let config: BridgeConfig =
        serde_yaml::from_value(value).map_err(|e| ConfigError::Schema {
            path: path.to_path_buf(),
            source: e,
        })?;
    config.validate()?;
    Ok(config)
}
