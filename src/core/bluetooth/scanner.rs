use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::MIN_RSSI_THRESHOLD;
use crate::core::bluetooth::types::{BluetoothDevice, DeviceFilter};
use crate::error::PairingError;

pub struct BluetoothScanner {
    adapter: Adapter,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scans until a device matching `filter` shows up, the timeout elapses or `cancel_token` fires.
    pub async fn find_device(
        &self,
        filter: &DeviceFilter,
        timeout: Duration,
        cancel_token: &CancellationToken,
    ) -> Result<Device> {
        // find connected device first
        info!("Checking for connected devices");
        for device in self.adapter.connected_devices().await? {
            let name = device.name().ok();
            if filter.matches(name.as_deref(), &[]) {
                Self::log_device_found(&device, name, None);
                return Ok(device);
            }
        }

        info!("Starting bluetooth scan for {}", filter);
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            let rssi = discovered_device.rssi;
                            debug!("Found device - Device: {:?}, RSSI: {:?}", device, rssi);

                            if rssi.is_some_and(|signal_strength| signal_strength < MIN_RSSI_THRESHOLD) {
                                continue;
                            }

                            let name = discovered_device
                                .adv_data
                                .local_name
                                .clone()
                                .or_else(|| device.name().ok());
                            if filter.matches(name.as_deref(), &discovered_device.adv_data.services) {
                                Self::log_device_found(&device, name, rssi);
                                return Ok(device);
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    info!("Bluetooth scan timed out after {:?}", timeout);
                    break;
                }
                _ = cancel_token.cancelled() => {
                    info!("Bluetooth scan cancelled.");
                    break;
                }
            }
        }

        Err(PairingError::DeviceNotFound {
            filter: filter.to_string(),
        }
        .into())
    }

    fn log_device_found(device: &Device, name: Option<String>, rssi: Option<i16>) {
        let id = device.id().to_string();
        let address = Self::extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());
        let found = BluetoothDevice::new(id, name, address, rssi);
        info!(
            "Found robot device: Address: {}, ID: {}, Name: {:?}, RSSI: {:?}",
            found.address, found.id, found.name, found.rssi
        );
    }

    fn extract_mac_address(device_id_str: &str) -> Option<String> {
        let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
        re.find_iter(device_id_str)
            .last()
            .map(|m| m.as_str().to_uppercase())
    }
}
