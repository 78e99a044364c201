//! Control-command encoding.
//! Resolves raw input to a direction token, suppresses repeats and serializes the
//! result in the robot family's wire format.

use anyhow::Result;
use serde::Serialize;

use crate::config::network_config::NetworkConfig;
use crate::core::media::endpoint::{ServiceKind, ServiceOptions, service_path};
use crate::core::profile::{DeviceProfile, InputSource, WireFormat};

/// Direction for `raw_token` from `source`, or `None` when the profile doesn't map it.
pub fn resolve_direction<'a>(
    profile: &'a DeviceProfile,
    source: InputSource,
    raw_token: &str,
) -> Option<&'a str> {
    profile
        .direction_map(source)?
        .get(raw_token)
        .map(String::as_str)
}

pub fn resolve_stop(profile: &DeviceProfile) -> &str {
    &profile.stop_command
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub ssid: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricData {
    pub server: ServerInfo,
    pub profile: String,
}

/// JSON messages understood by the robot firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceMessage {
    Control { direction: String },
    Metric { data: MetricData },
}

impl DeviceMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireCommand {
    Bare(String),
    Envelope(DeviceMessage),
}

impl WireCommand {
    /// Text handed to the transport. Bare tokens are sent unquoted.
    pub fn to_wire_text(&self) -> Result<String> {
        match self {
            WireCommand::Bare(direction) => Ok(direction.clone()),
            WireCommand::Envelope(message) => message.to_json(),
        }
    }
}

pub fn build_wire_command(wire_format: WireFormat, direction: &str) -> WireCommand {
    match wire_format {
        WireFormat::BareToken => WireCommand::Bare(direction.to_string()),
        WireFormat::JsonEnvelope => WireCommand::Envelope(DeviceMessage::Control {
            direction: direction.to_string(),
        }),
    }
}

/// Server settings a Wi-Fi capable robot needs to publish its camera on its own.
pub fn build_metric_message(network: &NetworkConfig, profile_key: &str) -> Result<DeviceMessage> {
    let options = ServiceOptions::new()
        .channel("instant")
        .name(network.channel_name.as_str())
        .track("colink")
        .mode("bundle");
    Ok(DeviceMessage::Metric {
        data: MetricData {
            server: ServerInfo {
                ssid: network.ssid.clone(),
                password: network.password.clone(),
                host: network.host.clone(),
                port: network.device_port(),
                path: service_path(ServiceKind::Pub, &options)?,
            },
            profile: profile_key.to_string(),
        },
    })
}

/// Last transmitted direction of a session; repeats are not sent again.
#[derive(Debug, Default, Clone)]
pub struct DirectionFilter {
    last: Option<String>,
}

impl DirectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `direction` differs from the last admitted one; it then becomes the last.
    pub fn admit(&mut self, direction: &str) -> bool {
        if self.last.as_deref() == Some(direction) {
            return false;
        }
        self.last = Some(direction.to_string());
        true
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Undo an admission whose message never reached the robot, so a resubmit goes through.
    pub fn revert(&mut self, previous: Option<String>) {
        self.last = previous;
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
