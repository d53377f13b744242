//! Device configuration record: oversampling, IIR filter and output data rate.
//!
//! Callers pass up to five positional register codes, in the order
//! humidity oversampling, pressure oversampling, temperature oversampling,
//! filter, ODR. Trailing values that are omitted keep their previous setting.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of positional overrides accepted by [`DeviceSettings::with_overrides`].
pub const MAX_OVERRIDES: usize = 5;

/// Oversampling setting for one TPH channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Oversampling {
    /// Channel switched off
    #[default]
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            5 => Oversampling::X16,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Number of conversions performed for this channel.
    pub fn cycles(self) -> u32 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// IIR filter coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Filter {
    #[default]
    Off,
    Size1,
    Size3,
    Size7,
    Size15,
    Size31,
    Size63,
    Size127,
}

impl Filter {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Filter::Off,
            1 => Filter::Size1,
            2 => Filter::Size3,
            3 => Filter::Size7,
            4 => Filter::Size15,
            5 => Filter::Size31,
            6 => Filter::Size63,
            7 => Filter::Size127,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Output data rate (standby time between periodic measurements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputDataRate {
    Ms0_59,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
    Ms10,
    Ms20,
    /// No standby time
    #[default]
    None,
}

impl OutputDataRate {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => OutputDataRate::Ms0_59,
            1 => OutputDataRate::Ms62_5,
            2 => OutputDataRate::Ms125,
            3 => OutputDataRate::Ms250,
            4 => OutputDataRate::Ms500,
            5 => OutputDataRate::Ms1000,
            6 => OutputDataRate::Ms10,
            7 => OutputDataRate::Ms20,
            8 => OutputDataRate::None,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// TPH configuration written to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub os_hum: Oversampling,
    pub os_pres: Oversampling,
    pub os_temp: Oversampling,
    pub filter: Filter,
    pub odr: OutputDataRate,
}

impl Default for DeviceSettings {
    /// Humidity ×16, pressure ×1, temperature ×2, filter off, no standby.
    fn default() -> Self {
        Self {
            os_hum: Oversampling::X16,
            os_pres: Oversampling::X1,
            os_temp: Oversampling::X2,
            filter: Filter::Off,
            odr: OutputDataRate::None,
        }
    }
}

impl DeviceSettings {
    /// All channels skipped; the state of a freshly reset chip.
    pub fn reset() -> Self {
        Self {
            os_hum: Oversampling::Skipped,
            os_pres: Oversampling::Skipped,
            os_temp: Oversampling::Skipped,
            filter: Filter::Off,
            odr: OutputDataRate::Ms0_59,
        }
    }

    /// Apply positional register codes on top of `self`.
    ///
    /// An empty slice yields [`DeviceSettings::default`]. Otherwise the first
    /// `codes.len()` parameters are replaced and the rest are kept.
    pub fn with_overrides(&self, codes: &[u8]) -> Result<Self> {
        if codes.is_empty() {
            return Ok(Self::default());
        }
        if codes.len() > MAX_OVERRIDES {
            return Err(Error::ConfigValidation(format!(
                "at most {MAX_OVERRIDES} settings may be given, got {}",
                codes.len()
            )));
        }

        let mut next = *self;
        for (position, &code) in codes.iter().enumerate() {
            match position {
                0 => next.os_hum = oversampling(code, "humidity")?,
                1 => next.os_pres = oversampling(code, "pressure")?,
                2 => next.os_temp = oversampling(code, "temperature")?,
                3 => {
                    next.filter = Filter::from_code(code).ok_or_else(|| {
                        Error::ConfigValidation(format!("invalid filter setting {code}"))
                    })?
                }
                _ => {
                    next.odr = OutputDataRate::from_code(code).ok_or_else(|| {
                        Error::ConfigValidation(format!("invalid output data rate {code}"))
                    })?
                }
            }
        }
        Ok(next)
    }

    /// Settings requested by the fusion engine: temperature follows the
    /// pressure oversampling, filter off, no standby.
    pub fn for_fusion(os_hum: Oversampling, os_pres: Oversampling) -> Self {
        Self {
            os_hum,
            os_pres,
            os_temp: os_pres,
            filter: Filter::Off,
            odr: OutputDataRate::None,
        }
    }
}

fn oversampling(code: u8, channel: &str) -> Result<Oversampling> {
    Oversampling::from_code(code)
        .ok_or_else(|| Error::ConfigValidation(format!("invalid {channel} oversampling {code}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_overrides_gives_defaults() {
        let current = DeviceSettings::reset();
        let next = current.with_overrides(&[]).unwrap();
        assert_eq!(next, DeviceSettings::default());
        assert_eq!(next.os_hum, Oversampling::X16);
        assert_eq!(next.os_pres, Oversampling::X1);
        assert_eq!(next.os_temp, Oversampling::X2);
        assert_eq!(next.filter, Filter::Off);
        assert_eq!(next.odr, OutputDataRate::None);
    }

    #[test]
    fn test_trailing_parameters_keep_previous_values() {
        let current = DeviceSettings {
            filter: Filter::Size3,
            odr: OutputDataRate::Ms250,
            ..DeviceSettings::default()
        };
        let next = current.with_overrides(&[1, 2]).unwrap();
        assert_eq!(next.os_hum, Oversampling::X1);
        assert_eq!(next.os_pres, Oversampling::X2);
        assert_eq!(next.os_temp, current.os_temp);
        assert_eq!(next.filter, Filter::Size3);
        assert_eq!(next.odr, OutputDataRate::Ms250);
    }

    #[test]
    fn test_all_five_overrides() {
        let next = DeviceSettings::default()
            .with_overrides(&[5, 4, 3, 2, 8])
            .unwrap();
        assert_eq!(next.os_hum, Oversampling::X16);
        assert_eq!(next.os_pres, Oversampling::X8);
        assert_eq!(next.os_temp, Oversampling::X4);
        assert_eq!(next.filter, Filter::Size3);
        assert_eq!(next.odr, OutputDataRate::None);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let current = DeviceSettings::default();
        assert!(current.with_overrides(&[6]).is_err());
        assert!(current.with_overrides(&[1, 1, 1, 9]).is_err());
        assert!(current.with_overrides(&[1, 1, 1, 1, 9]).is_err());
        assert!(current.with_overrides(&[1, 1, 1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_fusion_settings_mirror_pressure() {
        let settings = DeviceSettings::for_fusion(Oversampling::X1, Oversampling::X4);
        assert_eq!(settings.os_temp, Oversampling::X4);
        assert_eq!(settings.filter, Filter::Off);
    }
}
