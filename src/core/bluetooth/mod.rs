//! Bluetooth functionality for the CoBot bridge
//! This module handles discovering robots, pairing with them and writing
//! (optionally chunked) commands to their serial characteristic.

pub mod chunking;
mod connection;
pub mod constants;
mod manager;
mod scanner;
pub mod transport;
mod types;

// Re-export types that should be publicly accessible
pub use chunking::{ChunkReassembler, split_message};
pub use connection::ConnectionManager;
pub use manager::BluetoothManager;
pub use scanner::BluetoothScanner;
pub use transport::{BluestWriter, CharacteristicWriter, ChunkedTransport, SendOutcome};
pub use types::{BluetoothDevice, ConnectedDeviceState, DeviceFilter};
