//! Bluetooth manager for the CoBot bridge
//! Owns the adapter and the paired robot; pairing is what makes a write handle available.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bluest::Adapter;
use log::info;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::constants::BLUETOOTH_OPERATION_TIMEOUT_SECS;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::transport::BluestWriter;
use crate::core::bluetooth::types::{ConnectedDeviceState, DeviceFilter};
use crate::core::profile::DeviceProfile;
use crate::error::PairingError;

/// Manages Bluetooth operations
pub struct BluetoothManager {
    /// Currently paired robot
    connected_state: Arc<Mutex<Option<ConnectedDeviceState>>>,
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Bluetooth scanner
    scanner: BluetoothScanner,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager
    pub async fn new() -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or(PairingError::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let connection_manager = ConnectionManager::new(
            adapter.clone(),
            Duration::from_secs(BLUETOOTH_OPERATION_TIMEOUT_SECS),
        );
        let scanner = BluetoothScanner::new(adapter);

        Ok(Self {
            connected_state: Arc::new(Mutex::new(None)),
            connection_manager,
            scanner,
        })
    }

    /// Discovers a robot matching `profile`, connects and resolves its write characteristic.
    ///
    /// Returns the device name. Any previously paired robot is disconnected first; cancelling
    /// `cancel_token` stops the scan.
    pub async fn pair(
        &self,
        profile: &DeviceProfile,
        scan_timeout: Duration,
        cancel_token: &CancellationToken,
    ) -> Result<String> {
        self.disconnect().await?;

        let filter = DeviceFilter::from_profile(profile);
        let device = self
            .scanner
            .find_device(&filter, scan_timeout, cancel_token)
            .await?;
        let write_char = self
            .connection_manager
            .connect(&device, profile.service_uuid, profile.tx_characteristic_uuid)
            .await?;

        let name = device.name().unwrap_or_else(|_| device.id().to_string());
        let state = ConnectedDeviceState {
            device,
            write_characteristic: write_char,
            profile_key: profile.key.clone(),
        };
        *self.connected_state.lock().await = Some(state);

        info!("Robot {} paired as {}", name, profile.key);
        Ok(name)
    }

    /// Write handle of the paired robot, if any.
    pub async fn writer(&self) -> Option<BluestWriter> {
        self.connected_state
            .lock()
            .await
            .as_ref()
            .map(|state| BluestWriter::new(state.write_characteristic.clone()))
    }

    /// Disconnects the paired robot. A no-op when nothing is paired.
    pub async fn disconnect(&self) -> Result<()> {
        let state = self.connected_state.lock().await.take();
        match state {
            Some(state) => {
                info!("Disconnecting {} robot", state.profile_key);
                self.connection_manager.disconnect(&state.device).await
            }
            None => {
                info!("No robot paired, nothing to disconnect");
                Ok(())
            }
        }
    }
}
