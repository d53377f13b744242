//! Configuration for the BME69x agent binary.

use crate::fusion::{FusionProfile, SampleRate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which sensor to talk to
    pub sensor: SensorConfig,

    /// Directory holding fusion configuration and state files
    pub data_path: PathBuf,

    /// Directory for exported sample batches
    pub export_path: PathBuf,

    /// Die-to-ambient temperature offset in °C
    pub temp_offset: i8,

    /// Outputs the control loop subscribes to
    pub profile: FusionProfile,

    /// Sample rate for air-quality outputs
    pub sample_rate: SampleRate,

    /// Give up on a duty cycle after this many polls (unlimited if absent)
    #[serde(default)]
    pub poll_limit: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bme69x-agent");

        Self {
            sensor: SensorConfig::default(),
            data_path: data_dir.join("conf"),
            export_path: data_dir.join("exports"),
            temp_offset: crate::core::DEFAULT_TEMP_OFFSET,
            profile: FusionProfile::AirQuality,
            sample_rate: SampleRate::LowPower,
            poll_limit: Some(100),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bme69x-agent")
            .join("config.json")
    }

    /// Where cumulative session stats are kept.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("session_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Identifier used in blob file names.
    pub fn sensor_id(&self) -> String {
        self.sensor.id()
    }
}

/// Bus location and optional name of the sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub i2c_bus: u8,
    pub i2c_addr: u8,
    #[serde(default)]
    pub name: Option<String>,
    /// Variant id the simulated sensor reports
    #[serde(default = "default_variant_id")]
    pub variant_id: u8,
}

fn default_variant_id() -> u8 {
    0x02
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            i2c_addr: 0x76,
            name: None,
            variant_id: default_variant_id(),
        }
    }
}

impl SensorConfig {
    /// The configured name, or `sensor_0x<addr>`.
    pub fn id(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("sensor_0x{:02x}", self.i2c_addr),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.temp_offset, 5);
        assert_eq!(config.profile, FusionProfile::AirQuality);
        assert_eq!(config.sample_rate, SampleRate::LowPower);
        assert!(config.data_path.ends_with("conf"));
    }

    #[test]
    fn test_sensor_id() {
        let mut sensor = SensorConfig::default();
        assert_eq!(sensor.id(), "sensor_0x76");
        sensor.i2c_addr = 0x77;
        assert_eq!(sensor.id(), "sensor_0x77");
        sensor.name = Some("kitchen".to_string());
        assert_eq!(sensor.id(), "kitchen");
        sensor.name = Some(String::new());
        assert_eq!(sensor.id(), "sensor_0x77");
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config {
            profile: FusionProfile::GasClasses,
            poll_limit: None,
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("gas_classes"));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.profile, FusionProfile::GasClasses);
        assert_eq!(parsed.poll_limit, None);
    }
}
