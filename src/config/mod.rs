//! Bridge configuration, stored as one JSON file in the platform config directory.

pub mod control_config;
pub mod keymap_config;
pub mod logging_config;
pub mod network_config;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::control_config::ControlConfig;
use crate::config::keymap_config::KeymapConfig;
use crate::config::logging_config::LoggingConfig;
use crate::config::network_config::NetworkConfig;
use crate::utils::{app_config_dir, ensure_directory_exists};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub control: ControlConfig,
    pub keymap: KeymapConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// `<platform config dir>/cobot-bridge/config.json`
    pub fn default_path() -> Result<PathBuf> {
        Ok(app_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Loads the config from `file_path`; a missing file yields the defaults.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the config to `file_path`, creating the parent directory if needed.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(config_dir) = file_path.parent() {
            ensure_directory_exists(config_dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Config saved to {:?}", file_path);
        Ok(())
    }
}
