//! WiSafe2 bridge runtime
//!
//! Reads newline-delimited JSON from the serial bridge, keeps a registry of
//! the alarm units it relays, derives bridge liveness from heartbeats and
//! writes command codes back to the bridge.
//!
//! The [`Coordinator`] owns the runtime: a reader task that offloads the
//! blocking serial reads to the blocking pool, a poll task that republishes
//! a [`BridgeSnapshot`] every few seconds, and the command sender.

mod coordinator;
mod dispatcher;
mod error;
mod ports;
mod registry;
mod snapshot;
mod transport;

pub use coordinator::{Clock, Coordinator};
pub use dispatcher::Dispatcher;
pub use error::{BridgeError, BridgeResult};
pub use ports::available_ports;
pub use registry::DeviceRegistry;
pub use snapshot::{BridgeSnapshot, DeviceSnapshot};
pub use transport::{MemoryHandle, MemoryTransport, SerialTransport, Transport};
