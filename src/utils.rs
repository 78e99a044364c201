use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{error, info};
use tokio::fs;

use crate::error::ConfigError;

const APP_DIR_NAME: &str = "cobot-bridge";

/// `<platform config dir>/cobot-bridge`
pub fn app_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(APP_DIR_NAME))
}

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}
