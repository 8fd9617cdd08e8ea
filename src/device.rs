//! Remembered device, so later runs can skip discovery.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::{Result, TelemetryError};

/// Address and advertised name of the last connected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMemory {
    pub address: String,
    pub name: String,
}

impl DeviceMemory {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self { address: address.into(), name: name.into() }
    }

    /// Read the remembered device. A missing file means nothing is remembered.
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No remembered device");
                return Ok(None);
            }
            Err(e) => return Err(TelemetryError::file_error(path.to_path_buf(), e)),
        };

        let memory: DeviceMemory = serde_yaml_ng::from_str(&text)?;
        debug!(address = %memory.address, name = %memory.name, "Loaded remembered device");
        Ok(Some(memory))
    }

    /// Write to `path`, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TelemetryError::file_error(parent.to_path_buf(), e))?;
        }

        let text = serde_yaml_ng::to_string(self)?;
        tokio::fs::write(path, text)
            .await
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        info!(path = %path.display(), name = %self.name, "Device remembered");
        Ok(())
    }

    /// Remove the remembered device. Missing files are not an error.
    pub async fn forget(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TelemetryError::file_error(path.to_path_buf(), e)),
        }
    }
}
