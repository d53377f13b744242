//! Heater profile construction and validation.
//!
//! A profile is an ordered list of (temperature, duration) steps driving the
//! gas-sensing hotplate across one duty cycle. Validation happens here, before
//! anything is written to the device.

use crate::device::OperatingMode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of steps a heater profile may hold.
pub const MAX_PROFILE_LEN: usize = 10;

/// Length of one parallel-mode measurement cycle in milliseconds.
pub const PARALLEL_CYCLE_MS: u16 = 140;

/// One heater set-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaterStep {
    /// Target temperature in °C
    pub temperature: u16,
    /// Duration in ms (forced/sequential) or cycle multiplier (parallel)
    pub duration: u16,
}

/// Heater configuration owned by a sensor session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaterProfile {
    enabled: bool,
    steps: Vec<HeaterStep>,
    shared_duration: Option<u16>,
}

impl HeaterProfile {
    /// Heater switched off; no gas measurement.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Single set-point for forced mode. Both values must be non-zero.
    pub fn forced(temperature: u16, duration: u16) -> Result<Self> {
        if temperature == 0 || duration == 0 {
            return Err(Error::ConfigValidation(format!(
                "forced mode needs a non-zero heater temperature and duration (got {temperature} °C, {duration} ms)"
            )));
        }
        Ok(Self {
            enabled: true,
            steps: vec![HeaterStep {
                temperature,
                duration,
            }],
            shared_duration: None,
        })
    }

    /// Parallel-mode profile with a shared heating phase of `shared_duration` ms.
    pub fn parallel(temperatures: &[u16], durations: &[u16], shared_duration: u16) -> Result<Self> {
        Ok(Self {
            enabled: true,
            steps: validated_steps(temperatures, durations)?,
            shared_duration: Some(shared_duration),
        })
    }

    /// Sequential-mode profile.
    pub fn sequential(temperatures: &[u16], durations: &[u16]) -> Result<Self> {
        Ok(Self {
            enabled: true,
            steps: validated_steps(temperatures, durations)?,
            shared_duration: None,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn steps(&self) -> &[HeaterStep] {
        &self.steps
    }

    /// Number of profile steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn shared_duration(&self) -> Option<u16> {
        self.shared_duration
    }

    /// Duration of the first step, 0 for an empty profile.
    pub fn first_duration(&self) -> u16 {
        self.steps.first().map(|s| s.duration).unwrap_or(0)
    }
}

/// Caller request for a heater configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum HeaterSetup {
    Forced {
        temperature: u16,
        duration: u16,
    },
    Parallel {
        temperatures: Vec<u16>,
        durations: Vec<u16>,
    },
    Sequential {
        temperatures: Vec<u16>,
        durations: Vec<u16>,
    },
}

impl HeaterSetup {
    /// Operating mode the setup is meant for.
    pub fn mode(&self) -> OperatingMode {
        match self {
            HeaterSetup::Forced { .. } => OperatingMode::Forced,
            HeaterSetup::Parallel { .. } => OperatingMode::Parallel,
            HeaterSetup::Sequential { .. } => OperatingMode::Sequential,
        }
    }
}

/// Shared heating phase left over once the TPH measurement is done.
pub fn shared_heater_duration(meas_duration_us: u32) -> u16 {
    let meas_ms = u16::try_from(meas_duration_us / 1000).unwrap_or(u16::MAX);
    PARALLEL_CYCLE_MS.saturating_sub(meas_ms)
}

fn validated_steps(temperatures: &[u16], durations: &[u16]) -> Result<Vec<HeaterStep>> {
    if temperatures.len() != durations.len() {
        return Err(Error::ConfigValidation(format!(
            "temperature and duration profiles differ in length ({} vs {})",
            temperatures.len(),
            durations.len()
        )));
    }
    if temperatures.is_empty() {
        return Err(Error::ConfigValidation(
            "heater profile must have at least one step".to_string(),
        ));
    }
    if temperatures.len() > MAX_PROFILE_LEN {
        return Err(Error::ConfigValidation(format!(
            "heater profile has {} steps, at most {MAX_PROFILE_LEN} allowed",
            temperatures.len()
        )));
    }

    Ok(temperatures
        .iter()
        .zip(durations)
        .map(|(&temperature, &duration)| HeaterStep {
            temperature,
            duration,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_forced_requires_non_zero() {
        assert!(HeaterProfile::forced(300, 100).is_ok());
        assert!(HeaterProfile::forced(0, 100).is_err());
        assert!(HeaterProfile::forced(300, 0).is_err());
    }

    #[test]
    fn test_forced_profile_shape() {
        let profile = HeaterProfile::forced(320, 150).unwrap();
        assert!(profile.is_enabled());
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.first_duration(), 150);
        assert_eq!(profile.shared_duration(), None);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = HeaterProfile::sequential(&[200, 300], &[100]).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
    }

    #[test]
    fn test_empty_profile_rejected() {
        assert!(HeaterProfile::parallel(&[], &[], 90).is_err());
    }

    #[test]
    fn test_shared_duration() {
        assert_eq!(shared_heater_duration(50_000), 90);
        assert_eq!(shared_heater_duration(200_000), 0);
        let profile = HeaterProfile::parallel(&[320, 100], &[5, 2], 90).unwrap();
        assert_eq!(profile.shared_duration(), Some(90));
    }

    #[test]
    fn test_disabled_profile() {
        let profile = HeaterProfile::disabled();
        assert!(!profile.is_enabled());
        assert!(profile.is_empty());
        assert_eq!(profile.first_duration(), 0);
    }

    proptest! {
        #[test]
        fn prop_equal_lengths_up_to_ten_accepted(
            steps in prop::collection::vec((1u16..400, 1u16..4000), 1..=MAX_PROFILE_LEN)
        ) {
            let (temps, durs): (Vec<u16>, Vec<u16>) = steps.into_iter().unzip();
            let profile = HeaterProfile::sequential(&temps, &durs).unwrap();
            prop_assert_eq!(profile.len(), temps.len());
            prop_assert!(HeaterProfile::parallel(&temps, &durs, 90).is_ok());
        }

        #[test]
        fn prop_more_than_ten_rejected(len in (MAX_PROFILE_LEN + 1)..40usize) {
            let temps = vec![300u16; len];
            let durs = vec![100u16; len];
            prop_assert!(HeaterProfile::sequential(&temps, &durs).is_err());
            prop_assert!(HeaterProfile::parallel(&temps, &durs, 90).is_err());
        }

        #[test]
        fn prop_mismatched_lengths_rejected(a in 1usize..=MAX_PROFILE_LEN, b in 1usize..=MAX_PROFILE_LEN) {
            prop_assume!(a != b);
            let temps = vec![300u16; a];
            let durs = vec![100u16; b];
            prop_assert!(HeaterProfile::sequential(&temps, &durs).is_err());
        }
    }
}
