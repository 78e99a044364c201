//! Constants used by the Bluetooth layer
//! Service/characteristic UUIDs of the supported robot boards, timeouts and scan settings.

use uuid::Uuid;

/// Nordic UART service, as exposed by the micro:bit and ESP32 CoBot boards
pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// UART characteristic the board transmits on (micro:bit naming)
pub const UART_TX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// UART characteristic the board receives on (micro:bit naming)
pub const UART_RX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// HM-10 serial bridge service used by the XRover boards
pub const HM10_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// HM-10 uses a single characteristic for both directions
pub const HM10_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Timeout for Bluetooth operations in seconds
pub const BLUETOOTH_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 10;

/// Devices weaker than this are ignored while scanning
pub const MIN_RSSI_THRESHOLD: i16 = -90;
