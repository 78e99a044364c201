//! Bluetooth connection handling
//! Connects to a discovered robot and resolves its command characteristic.

use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, Characteristic, Device};
use log::info;
use uuid::Uuid;

use crate::error::PairingError;

/// Connection manager for robots
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
    operation_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter, operation_timeout: Duration) -> Self {
        Self {
            adapter,
            operation_timeout,
        }
    }

    /// Connect to the device and look up the write characteristic.
    /// A single attempt is made; the caller re-invokes pairing on failure.
    pub async fn connect(
        &self,
        device: &Device,
        service_uuid: Uuid,
        write_char_uuid: Uuid,
    ) -> Result<Characteristic> {
        match tokio::time::timeout(
            self.operation_timeout,
            self.try_connect(device, service_uuid, write_char_uuid),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PairingError::Timeout(self.operation_timeout.as_secs()).into()),
        }
    }

    async fn try_connect(
        &self,
        device: &Device,
        service_uuid: Uuid,
        write_char_uuid: Uuid,
    ) -> Result<Characteristic> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let id = device.id().to_string();
        info!("Device details - ID: {}, Name: {:?}", id, name);

        if !device.is_connected().await {
            info!("Connecting to GATT Server...");
            self.adapter.connect_device(device).await?;
        }

        info!("Getting service {}...", service_uuid);
        let services = device.services().await?;
        let service = services
            .iter()
            .find(|s| s.uuid() == service_uuid)
            .ok_or_else(|| {
                for service in &services {
                    info!("Available service: {}", service.uuid());
                }
                PairingError::ServiceNotFound(service_uuid)
            })?
            .clone();

        info!("Getting characteristic {}...", write_char_uuid);
        let write_char = service
            .characteristics()
            .await?
            .into_iter()
            .find(|c| c.uuid() == write_char_uuid)
            .ok_or(PairingError::CharacteristicNotFound(write_char_uuid))?;

        info!("Found write characteristic: {}", write_char.uuid());
        Ok(write_char)
    }

    /// Disconnect from the robot
    pub async fn disconnect(&self, device: &Device) -> Result<()> {
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            self.adapter.disconnect_device(device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Bluetooth Device is already disconnected");
        }
        Ok(())
    }
}
