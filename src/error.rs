//! Error types shared across the bridge.
//! I/O seams propagate `anyhow::Result`; these enums name the failures callers match on.

use thiserror::Error;
use uuid::Uuid;

/// Failures while discovering and pairing with a robot.
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("No Bluetooth adapter found")]
    AdapterUnavailable,
    #[error("No device matching {filter} was found")]
    DeviceNotFound { filter: String },
    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),
    #[error("Bluetooth operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Failures of a control session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown robot profile: {0}")]
    UnknownProfile(String),
    #[error("No robot is paired")]
    NotPaired,
    #[error("WebSocket is not open")]
    SocketNotOpen,
    #[error("No WebSocket is attached to this session")]
    WebSocketNotConfigured,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the platform configuration directory")]
    NoConfigDir,
}
