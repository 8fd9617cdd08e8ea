//! Configuration loaded from YAML.
//!
//! Every section and key is optional; missing keys take their defaults.
//!
//! ```yaml
//! decoder:
//!   variant: extended          # simple | extended
//!   battery_encoding: charge_level
//!   fix_policy: suppress       # keep | suppress | reject
//! reassembler:
//!   resync: skip_byte          # skip_byte | wait
//!   max_payload_len: 1024
//! download:
//!   timeout_ms: 600000
//!   chunk_timeout_ms: 10000
//!   nack_retry:
//!     max_attempts: 2
//!     backoff_ms: 500
//! output:
//!   csv_dir: ./sessions
//!   device_name: RaceBox Mini
//! device_memory_path: ./racebox_device.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::{DecoderConfig, ReassemblerConfig};
use crate::{Result, TelemetryError};

/// Default device memory file name.
const DEVICE_MEMORY_FILE_NAME: &str = "racebox_device.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub decoder: DecoderConfig,
    pub reassembler: ReassemblerConfig,
    pub download: DownloadConfig,
    pub output: OutputConfig,
    /// Where the last connected device is remembered.
    pub device_memory_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            reassembler: ReassemblerConfig::default(),
            download: DownloadConfig::default(),
            output: OutputConfig::default(),
            device_memory_path: PathBuf::from(DEVICE_MEMORY_FILE_NAME),
        }
    }
}

/// Download wait bounds and retry policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Overall bound on the download. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    /// Longest gap allowed between two transport chunks.
    pub chunk_timeout_ms: Option<u64>,
    pub nack_retry: RetryPolicy,
}

impl DownloadConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn chunk_timeout(&self) -> Option<Duration> {
        self.chunk_timeout_ms.map(Duration::from_millis)
    }
}

/// Re-send the download command after a negative ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Re-sends allowed. `0` fails on the first negative ack.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 0, backoff_ms: 500 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Where sessions are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for CSV output. `None` disables the CSV sink.
    pub csv_dir: Option<PathBuf>,
    /// Used in output file names.
    pub device_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { csv_dir: None, device_name: "RaceBox".to_string() }
    }
}

impl Config {
    /// Load and validate a YAML configuration file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML text. Empty text yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config =
            if text.trim().is_empty() { Config::default() } else { serde_yaml_ng::from_str(text)? };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.reassembler.max_payload_len == 0 {
            return Err(TelemetryError::config_error("reassembler.max_payload_len must be > 0"));
        }
        if self.reassembler.max_payload_len > usize::from(u16::MAX) {
            return Err(TelemetryError::config_error(format!(
                "reassembler.max_payload_len must be <= {}",
                u16::MAX
            )));
        }
        if self.download.timeout_ms == Some(0) {
            return Err(TelemetryError::config_error("download.timeout_ms must be > 0"));
        }
        if self.download.chunk_timeout_ms == Some(0) {
            return Err(TelemetryError::config_error("download.chunk_timeout_ms must be > 0"));
        }
        let retry = &self.download.nack_retry;
        if retry.max_attempts > 0 && retry.backoff_ms == 0 {
            return Err(TelemetryError::config_error(
                "download.nack_retry.backoff_ms must be > 0 when retries are enabled",
            ));
        }
        if self.output.device_name.trim().is_empty() {
            return Err(TelemetryError::config_error("output.device_name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FixPolicy;
    use crate::types::{BatteryEncoding, SchemaVariant};

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.decoder.variant, SchemaVariant::Simple);
        assert_eq!(config.download.nack_retry.max_attempts, 0);
        assert_eq!(config.download.timeout(), None);
        assert_eq!(config.device_memory_path, PathBuf::from("racebox_device.yaml"));
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = Config::from_yaml_str(
            "decoder:\n  variant: extended\n  fix_policy: suppress\n\
             download:\n  timeout_ms: 30000\n",
        )
        .unwrap();

        assert_eq!(config.decoder.variant, SchemaVariant::Extended);
        assert_eq!(config.decoder.fix_policy, FixPolicy::Suppress);
        assert_eq!(config.decoder.battery_encoding, BatteryEncoding::ChargeLevel);
        assert_eq!(config.download.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.reassembler.max_payload_len, 1024);
        assert_eq!(config.output.device_name, "RaceBox");
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = Config::default();
        config.output.csv_dir = Some(PathBuf::from("/tmp/sessions"));
        config.download.nack_retry = RetryPolicy { max_attempts: 3, backoff_ms: 250 };

        let text = config.to_yaml_string().unwrap();
        assert_eq!(Config::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            "reassembler:\n  max_payload_len: 0\n",
            "download:\n  timeout_ms: 0\n",
            "download:\n  nack_retry:\n    max_attempts: 2\n    backoff_ms: 0\n",
            "output:\n  device_name: '  '\n",
        ];
        for case in cases {
            let err = Config::from_yaml_str(case).unwrap_err();
            assert!(matches!(err, TelemetryError::Config { .. }), "{case}: {err:?}");
        }
    }

    #[test]
    fn unknown_enum_value_is_a_config_error() {
        let err = Config::from_yaml_str("decoder:\n  variant: verbose\n").unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = Config::load_from("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, TelemetryError::File { .. }));
    }
}
