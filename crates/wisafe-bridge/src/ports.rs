//! Serial port discovery

use crate::error::{BridgeError, BridgeResult};
use tracing::debug;

/// Names of the serial ports present on this machine
pub fn available_ports() -> BridgeResult<Vec<String>> {
    let ports = serialport::available_ports().map_err(BridgeError::Enumerate)?;
    debug!(count = ports.len(), "Enumerated serial ports");
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
