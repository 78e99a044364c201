use serde::{Deserialize, Serialize};

use crate::core::media::endpoint::OriginScheme;

/// Media server and robot Wi-Fi settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Media server host
    pub host: String,
    /// Media server port
    pub port: u16,
    /// Whether the bridge acts for a secure (https) origin: selects wss/https
    pub secure_origin: bool,
    /// Channel joined by the pub/sub sockets
    pub channel: String,
    /// Channel name the robot publishes under
    pub channel_name: String,
    pub track: String,
    pub mode: String,
    /// Wi-Fi network provisioned to the robot
    pub ssid: String,
    pub password: String,
    pub heartbeat_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            host: "cobot.center".to_string(),
            port: 8286,
            secure_origin: true,
            channel: "instant".to_string(),
            channel_name: String::new(),
            track: "colink".to_string(),
            mode: "bundle".to_string(),
            ssid: String::new(),
            password: String::new(),
            heartbeat_interval_ms: 10_000,
        }
    }
}

impl NetworkConfig {
    pub fn scheme(&self) -> OriginScheme {
        OriginScheme::from_secure(self.secure_origin)
    }

    /// Port the robot should dial: one below the configured port behind a secure origin.
    pub fn device_port(&self) -> u16 {
        if self.secure_origin {
            self.port.saturating_sub(1)
        } else {
            self.port
        }
    }
}
