//! WiSafe2 entities
//!
//! Each published [`BridgeSnapshot`](wisafe_bridge::BridgeSnapshot) is
//! rendered into sensor, binary sensor and button states in the state
//! machine. The bridge carries its status sensors and the command buttons;
//! every alarm unit gets its own sensors, with smoke and carbon monoxide
//! sensors chosen by device category.

pub mod binary_sensor;
pub mod button;
mod description;
mod device_info;
mod renderer;
pub mod sensor;

pub use button::Button;
pub use description::{EntityCategory, EntityDescription, Platform, RenderedEntity};
pub use device_info::DeviceInfo;
pub use renderer::EntityRenderer;
