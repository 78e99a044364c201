//! CoBot bridge library
//! Drives CoBot and XRover robots over Bluetooth LE and relays commands and video through the
//! media server.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

pub use config::AppConfig;
pub use state::AppState;
