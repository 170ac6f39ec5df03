//! Bridge errors

use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to list serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("bridge not connected")]
    NotConnected,

    #[error("bridge state lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
