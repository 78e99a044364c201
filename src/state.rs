//! Application state management
//! This module defines the state shared by the CLI command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::core::{BluetoothManager, ControlSession, MessageView, ProfileRegistry};
use crate::error::SessionError;

/// Application state for one bridge run
pub struct AppState {
    /// Effective configuration (file + command line overrides)
    pub config: AppConfig,
    /// Where the configuration was loaded from
    pub config_path: PathBuf,
    /// The control session for the selected robot
    pub session: Arc<ControlSession>,
    /// The Bluetooth manager, created on first use
    bluetooth_manager: Mutex<Option<Arc<Mutex<BluetoothManager>>>>,
}

impl AppState {
    /// Creates a new AppState for the robot selected in `config`
    pub fn new(config: AppConfig, config_path: PathBuf, view: Arc<dyn MessageView>) -> Result<Self> {
        let profile = ProfileRegistry::builtin()
            .get(&config.control.robot)
            .ok_or_else(|| SessionError::UnknownProfile(config.control.robot.clone()))?
            .clone();
        let session = Arc::new(ControlSession::new(profile, config.control.transport, view));
        Ok(Self {
            config,
            config_path,
            session,
            bluetooth_manager: Mutex::new(None),
        })
    }

    /// Gets the Bluetooth manager, bringing up the adapter the first time
    pub async fn get_bluetooth_manager_arc(&self) -> Result<Arc<Mutex<BluetoothManager>>> {
        let mut slot = self.bluetooth_manager.lock().await;
        if let Some(manager) = slot.as_ref() {
            return Ok(manager.clone());
        }
        info!("Initializing BluetoothManager...");
        let manager = Arc::new(Mutex::new(BluetoothManager::new().await?));
        *slot = Some(manager.clone());
        Ok(manager)
    }

    /// The Bluetooth manager if it was ever brought up
    pub async fn existing_bluetooth_manager(&self) -> Option<Arc<Mutex<BluetoothManager>>> {
        self.bluetooth_manager.lock().await.clone()
    }
}
