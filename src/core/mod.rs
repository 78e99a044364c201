//! Core functionality for the CoBot bridge
//! Robot profiles, BLE transport, media server protocol and the control session tying them together.

pub mod bluetooth;
pub mod command;
pub mod gesture;
pub mod media;
pub mod profile;
pub mod session;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use profile::{DeviceProfile, ProfileRegistry};
pub use session::{ControlSession, Dispatch, InputEvent, MessageView};
