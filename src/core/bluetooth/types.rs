//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use bluest::{Characteristic, Device};
use uuid::Uuid;

use crate::core::profile::DeviceProfile;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, serde::Serialize)]
pub struct BluetoothDevice {
    /// The name of the device, if available
    pub name: Option<String>,
    /// The address of the device (MAC address on most platforms, may be N/A on macOS)
    pub address: String,
    /// Platform-specific unique identifier for the device
    pub id: String,
    /// The signal strength (RSSI) of the device
    pub rssi: Option<i16>,
}

impl BluetoothDevice {
    pub fn new(id: String, name: Option<String>, address: String, rssi: Option<i16>) -> Self {
        Self {
            name,
            address,
            id,
            rssi,
        }
    }
}

/// Discovery filter built from a robot profile.
///
/// A device is accepted when it matches *any* of the criteria: its name starts with the
/// prefix, or it advertises one of the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub name_prefix: Option<String>,
    pub services: Vec<Uuid>,
}

impl DeviceFilter {
    pub fn from_profile(profile: &DeviceProfile) -> Self {
        let name_prefix = Some(profile.name_prefix.clone()).filter(|prefix| !prefix.is_empty());
        Self {
            name_prefix,
            services: vec![profile.service_uuid],
        }
    }

    pub fn matches(&self, name: Option<&str>, advertised_services: &[Uuid]) -> bool {
        let name_matches = match (&self.name_prefix, name) {
            (Some(prefix), Some(name)) => name.starts_with(prefix.as_str()),
            _ => false,
        };
        name_matches
            || advertised_services
                .iter()
                .any(|uuid| self.services.contains(uuid))
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let services: Vec<String> = self.services.iter().map(Uuid::to_string).collect();
        match &self.name_prefix {
            Some(prefix) => write!(f, "name prefix {:?} or services [{}]", prefix, services.join(", ")),
            None => write!(f, "services [{}]", services.join(", ")),
        }
    }
}

/// Represents the state of a successfully paired robot.
/// Writes are only possible through this handle, so nothing is written before pairing completes.
#[derive(Clone)]
pub struct ConnectedDeviceState {
    /// The device handle, used for checking connection status or disconnecting.
    pub device: Device,
    /// The characteristic handle for writing commands to the robot.
    pub write_characteristic: Characteristic,
    /// Key of the profile the robot was paired with
    pub profile_key: String,
}
