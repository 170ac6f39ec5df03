//! Configuration for the WiSafe2 bridge
//!
//! Configuration is a YAML file naming the serial port, its baud rate and
//! any alarm devices to register up front. Two custom tags are understood:
//!
//! - `!env_var NAME [default]` - substitute an environment variable
//! - `!secret key` - substitute a value from `secrets.yaml` next to the file
//!
//! # Example
//!
//! ```yaml
//! serial_port: !env_var WISAFE2_PORT /dev/ttyUSB0
//! baud_rate: 115200
//! devices:
//!   - device_id: "A1B2C3"
//!     model: "0401"
//!     name: Hall Smoke
//!     location: Hall
//! ```

mod bridge_config;
mod error;
mod loader;
mod secrets;

pub use bridge_config::{load_config, parse_config, BridgeConfig, DeviceConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::YamlLoader;
pub use secrets::Secrets;
