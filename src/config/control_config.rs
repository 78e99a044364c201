use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::DEFAULT_SCAN_DURATION_SECS;

/// Which link carries direction commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Commands are written to the paired robot
    #[default]
    Ble,
    /// Commands go out on the subscribe socket
    Websocket,
    /// Commands go out on the subscribe socket while messages arriving on the publish socket are
    /// relayed to the paired robot
    Hybrid,
}

impl TransportMode {
    pub fn commands_over_ble(&self) -> bool {
        matches!(self, TransportMode::Ble)
    }

    pub fn uses_socket(&self) -> bool {
        !self.commands_over_ble()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Profile key of the robot to drive
    pub robot: String,
    pub transport: TransportMode,
    pub scan_timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            robot: "CoBot_Pro".to_string(),
            transport: TransportMode::Ble,
            scan_timeout_secs: DEFAULT_SCAN_DURATION_SECS,
        }
    }
}
