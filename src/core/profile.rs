//! Robot profile registry
//! Static mapping from a selectable robot key to its BLE identifiers, transfer limit and
//! input-to-direction command maps.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    HM10_CHARACTERISTIC_UUID, HM10_SERVICE_UUID, UART_RX_CHARACTERISTIC_UUID, UART_SERVICE_UUID,
    UART_TX_CHARACTERISTIC_UUID,
};

/// Where a raw input token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputSource {
    /// `KeyboardEvent.code` values such as `KeyW`
    Keyboard,
    /// Gesture recognizer category names such as `Closed_Fist`
    HandGesture,
}

/// How a direction token is put on the wire for a robot family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireFormat {
    /// The token itself, e.g. `F`
    BareToken,
    /// `{"type":"control","direction":"<token>"}`
    JsonEnvelope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlType {
    Direction,
}

/// Connection parameters and command maps for one robot family.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub key: String,
    pub label: String,
    pub name_prefix: String,
    pub control_types: Vec<ControlType>,
    pub has_bluetooth_setting: bool,
    pub has_wifi_setting: bool,
    #[serde(rename = "serviceUUID")]
    pub service_uuid: Uuid,
    #[serde(rename = "rxCharacteristicUUID")]
    pub rx_characteristic_uuid: Uuid,
    #[serde(rename = "txCharacteristicUUID")]
    pub tx_characteristic_uuid: Uuid,
    /// `None` means messages are written unchunked.
    pub max_transfer_size: Option<NonZeroUsize>,
    pub control_command_map: BTreeMap<InputSource, BTreeMap<String, String>>,
    pub stop_command: String,
    pub wire_format: WireFormat,
}

impl DeviceProfile {
    /// Direction map for one input source, if the robot supports that source at all.
    pub fn direction_map(&self, source: InputSource) -> Option<&BTreeMap<String, String>> {
        self.control_command_map.get(&source)
    }

    pub fn supports(&self, source: InputSource) -> bool {
        self.control_command_map.contains_key(&source)
    }
}

fn direction_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(raw, direction)| (raw.to_string(), direction.to_string()))
        .collect()
}

fn cobot_keyboard() -> BTreeMap<String, String> {
    direction_map(&[("KeyW", "N"), ("KeyA", "CCW"), ("KeyS", "S"), ("KeyD", "CW")])
}

fn builtin_profiles() -> Vec<DeviceProfile> {
    vec![
        DeviceProfile {
            key: "CoBot_Pro".into(),
            label: "CoBot-Pro".into(),
            name_prefix: "BBC".into(),
            control_types: vec![ControlType::Direction],
            has_bluetooth_setting: true,
            has_wifi_setting: true,
            service_uuid: UART_SERVICE_UUID,
            rx_characteristic_uuid: UART_RX_CHARACTERISTIC_UUID,
            tx_characteristic_uuid: UART_TX_CHARACTERISTIC_UUID,
            max_transfer_size: NonZeroUsize::new(15),
            control_command_map: BTreeMap::from([
                (InputSource::Keyboard, cobot_keyboard()),
                (
                    InputSource::HandGesture,
                    direction_map(&[
                        ("Closed_Fist", "N"),
                        ("Open_Palm", "CCW"),
                        ("Pointing_Up", "S"),
                        ("Thumb_Up", "CW"),
                        ("Victory", "STOP"),
                    ]),
                ),
            ]),
            stop_command: "STOP".into(),
            wire_format: WireFormat::JsonEnvelope,
        },
        DeviceProfile {
            key: "CoBot_ESP32".into(),
            label: "CoBot-ESP32".into(),
            name_prefix: "CoPlay".into(),
            control_types: vec![ControlType::Direction],
            has_bluetooth_setting: true,
            has_wifi_setting: true,
            service_uuid: UART_SERVICE_UUID,
            rx_characteristic_uuid: UART_RX_CHARACTERISTIC_UUID,
            tx_characteristic_uuid: UART_TX_CHARACTERISTIC_UUID,
            max_transfer_size: None,
            control_command_map: BTreeMap::from([(InputSource::Keyboard, cobot_keyboard())]),
            stop_command: "STOP".into(),
            wire_format: WireFormat::JsonEnvelope,
        },
        DeviceProfile {
            key: "XROVER_DOT".into(),
            label: "XRover-Dot".into(),
            name_prefix: "HMSoft".into(),
            control_types: vec![ControlType::Direction],
            has_bluetooth_setting: true,
            has_wifi_setting: false,
            service_uuid: HM10_SERVICE_UUID,
            rx_characteristic_uuid: HM10_CHARACTERISTIC_UUID,
            tx_characteristic_uuid: HM10_CHARACTERISTIC_UUID,
            max_transfer_size: None,
            control_command_map: BTreeMap::from([(
                InputSource::Keyboard,
                // KeyH draws a heart
                direction_map(&[
                    ("KeyW", "F"),
                    ("KeyA", "L"),
                    ("KeyS", "B"),
                    ("KeyD", "R"),
                    ("KeyH", "H"),
                ]),
            )]),
            stop_command: "S".into(),
            wire_format: WireFormat::BareToken,
        },
        DeviceProfile {
            key: "XROVER_GRIPPER".into(),
            label: "XRover-Gripper".into(),
            name_prefix: "HM-10".into(),
            control_types: vec![ControlType::Direction],
            has_bluetooth_setting: true,
            has_wifi_setting: false,
            service_uuid: HM10_SERVICE_UUID,
            rx_characteristic_uuid: HM10_CHARACTERISTIC_UUID,
            tx_characteristic_uuid: HM10_CHARACTERISTIC_UUID,
            max_transfer_size: None,
            control_command_map: BTreeMap::from([(
                InputSource::Keyboard,
                direction_map(&[
                    ("KeyW", "F"),
                    ("KeyA", "L"),
                    ("KeyS", "B"),
                    ("KeyD", "R"),
                    ("KeyK", "O"),
                    ("KeyL", "C"),
                ]),
            )]),
            stop_command: "S".into(),
            wire_format: WireFormat::BareToken,
        },
    ]
}

static BUILTIN: LazyLock<ProfileRegistry> = LazyLock::new(|| ProfileRegistry {
    profiles: builtin_profiles(),
});

/// Immutable set of robot profiles, looked up by selection key.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<DeviceProfile>,
}

impl ProfileRegistry {
    /// The profiles shipped with the bridge.
    pub fn builtin() -> &'static ProfileRegistry {
        &BUILTIN
    }

    pub fn get(&self, key: &str) -> Option<&DeviceProfile> {
        self.profiles.iter().find(|profile| profile.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|profile| profile.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.profiles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_robots() {
        let keys: Vec<&str> = ProfileRegistry::builtin().keys().collect();
        assert_eq!(keys, ["CoBot_Pro", "CoBot_ESP32", "XROVER_DOT", "XROVER_GRIPPER"]);
    }

    #[test]
    fn only_cobot_pro_is_chunked() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(
            registry.get("CoBot_Pro").unwrap().max_transfer_size,
            NonZeroUsize::new(15)
        );
        for key in ["CoBot_ESP32", "XROVER_DOT", "XROVER_GRIPPER"] {
            assert!(registry.get(key).unwrap().max_transfer_size.is_none(), "{key}");
        }
    }

    #[test]
    fn wire_format_is_a_profile_field() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.get("XROVER_DOT").unwrap().wire_format, WireFormat::BareToken);
        assert_eq!(registry.get("CoBot_ESP32").unwrap().wire_format, WireFormat::JsonEnvelope);
    }

    #[test]
    fn gesture_map_only_on_cobot_pro() {
        let registry = ProfileRegistry::builtin();
        assert!(registry.get("CoBot_Pro").unwrap().supports(InputSource::HandGesture));
        assert!(!registry.get("XROVER_GRIPPER").unwrap().supports(InputSource::HandGesture));
    }

    #[test]
    fn unknown_key_is_none() {
        assert!(ProfileRegistry::builtin().get("R2D2").is_none());
    }
}
