//! Register-level value types shared by the sensor interface and the core.
//!
//! These mirror what the chip reports: an operating mode, a resolved variant,
//! and per-poll measurement fields carrying a status bitmask.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status bit: the field holds data not yet read.
pub const STATUS_NEW_DATA: u8 = 0x80;
/// Status bit: the gas measurement in this field is valid.
pub const STATUS_GAS_VALID: u8 = 0x20;
/// Status bit: the heater reached its target temperature.
pub const STATUS_HEATER_STABLE: u8 = 0x10;
/// All three bits above.
pub const STATUS_VALID_DATA: u8 = STATUS_NEW_DATA | STATUS_GAS_VALID | STATUS_HEATER_STABLE;

/// Chip id reported by every BME68x/BME69x part.
pub const CHIP_ID: u8 = 0x61;

/// First of the four unique-id registers (MSB first).
pub const REG_UNIQUE_ID: u8 = 0x83;

/// Device power/measurement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    #[default]
    Sleep,
    /// Single-shot measurement
    Forced,
    /// Multi-step heater profile with a shared heating phase
    Parallel,
    /// Multi-step heater profile, one step per measurement
    Sequential,
}

impl OperatingMode {
    /// Register encoding of the mode.
    pub fn code(self) -> u8 {
        match self {
            OperatingMode::Sleep => 0,
            OperatingMode::Forced => 1,
            OperatingMode::Parallel => 2,
            OperatingMode::Sequential => 3,
        }
    }

    /// Decode a register value.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OperatingMode::Sleep),
            1 => Some(OperatingMode::Forced),
            2 => Some(OperatingMode::Parallel),
            3 => Some(OperatingMode::Sequential),
            _ => None,
        }
    }

    /// Whether the mode walks a multi-step heater profile.
    pub fn is_profiled(self) -> bool {
        matches!(self, OperatingMode::Parallel | OperatingMode::Sequential)
    }
}

/// Sensor variant, resolved once from the variant id register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Low gas variant
    Bme680,
    /// High gas variant
    Bme688,
    /// New high gas variant
    Bme690,
}

impl Variant {
    pub fn from_variant_id(id: u8) -> Result<Self, DeviceError> {
        match id {
            0x00 => Ok(Variant::Bme680),
            0x01 => Ok(Variant::Bme688),
            0x02 => Ok(Variant::Bme690),
            other => Err(DeviceError::UnknownVariant(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Variant::Bme680 => "BME680",
            Variant::Bme688 => "BME688",
            Variant::Bme690 => "BME690",
        }
    }

    /// The BME680 only supports forced mode.
    pub fn supports_mode(self, mode: OperatingMode) -> bool {
        match self {
            Variant::Bme680 => !mode.is_profiled(),
            Variant::Bme688 | Variant::Bme690 => true,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Factory calibration data. Opaque to everything but the sensor interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calibration(pub Vec<u8>);

/// Result of initializing the chip.
#[derive(Debug, Clone)]
pub struct ChipInfo {
    pub calibration: Calibration,
    pub chip_id: u8,
    pub variant_id: u8,
}

/// One data field returned by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementField {
    /// Temperature in °C
    pub temperature: f32,
    /// Pressure in Pa
    pub pressure: f32,
    /// Relative humidity in %
    pub humidity: f32,
    /// Gas resistance in Ω
    pub gas_resistance: f32,
    /// Heater profile step that produced this field
    pub gas_index: u8,
    /// Position within the current duty-cycle pass
    pub meas_index: u8,
    /// Status bitmask (`STATUS_*`)
    pub status: u8,
}

impl MeasurementField {
    pub fn has_new_data(&self) -> bool {
        self.status & STATUS_NEW_DATA != 0
    }

    pub fn is_gas_valid(&self) -> bool {
        self.status & STATUS_GAS_VALID != 0
    }

    pub fn is_heater_stable(&self) -> bool {
        self.status & STATUS_HEATER_STABLE != 0
    }
}

/// Errors reported by a sensor interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("communication failure: {0}")]
    Communication(String),

    #[error("unexpected chip id 0x{0:02x}")]
    UnknownChip(u8),

    #[error("unknown variant id 0x{0:02x}")]
    UnknownVariant(u8),

    #[error("invalid length: {0}")]
    InvalidLength(usize),

    #[error("sensor cannot measure in {0:?} mode")]
    InvalidMode(OperatingMode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_mode_codes() {
        for mode in [
            OperatingMode::Sleep,
            OperatingMode::Forced,
            OperatingMode::Parallel,
            OperatingMode::Sequential,
        ] {
            assert_eq!(OperatingMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(OperatingMode::from_code(4), None);
    }

    #[test]
    fn test_variant_resolution() {
        assert_eq!(Variant::from_variant_id(0).unwrap(), Variant::Bme680);
        assert_eq!(Variant::from_variant_id(2).unwrap().name(), "BME690");
        assert!(Variant::from_variant_id(7).is_err());
        assert!(!Variant::Bme680.supports_mode(OperatingMode::Parallel));
        assert!(Variant::Bme680.supports_mode(OperatingMode::Forced));
        assert!(Variant::Bme688.supports_mode(OperatingMode::Sequential));
    }

    #[test]
    fn test_status_bits() {
        let field = MeasurementField {
            status: STATUS_GAS_VALID | STATUS_HEATER_STABLE,
            ..Default::default()
        };
        assert!(field.is_gas_valid());
        assert!(field.is_heater_stable());
        assert!(!field.has_new_data());
        assert_eq!(STATUS_VALID_DATA, 0xB0);
    }
}
