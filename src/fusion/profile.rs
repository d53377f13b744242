//! Fusion profiles: which outputs a session subscribes to and how the
//! control loop drives the device for them.

use crate::device::OperatingMode;
use crate::fusion::outputs::OutputId;
use crate::fusion::types::{SampleRate, SubscriptionRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// When the control loop writes the operating mode requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeWrite {
    /// Before the heater is configured, on every control call
    BeforeConfig,
    /// Only when the engine triggers a measurement
    OnTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionProfile {
    /// IAQ, CO₂/VOC equivalents and compensated TPH
    #[default]
    AirQuality,
    /// Gas-class estimates from a parallel-mode heater profile
    GasClasses,
}

impl FusionProfile {
    pub fn outputs(self) -> &'static [OutputId] {
        match self {
            FusionProfile::AirQuality => &[
                OutputId::Iaq,
                OutputId::StaticIaq,
                OutputId::Co2Equivalent,
                OutputId::BreathVocEquivalent,
                OutputId::TvocEquivalent,
                OutputId::RawTemperature,
                OutputId::RawPressure,
                OutputId::RawHumidity,
                OutputId::RawGas,
                OutputId::StabilizationStatus,
                OutputId::RunInStatus,
                OutputId::HeatCompensatedTemperature,
                OutputId::HeatCompensatedHumidity,
                OutputId::GasPercentage,
            ],
            FusionProfile::GasClasses => &[
                OutputId::GasEstimate1,
                OutputId::GasEstimate2,
                OutputId::GasEstimate3,
                OutputId::GasEstimate4,
                OutputId::RawGasIndex,
            ],
        }
    }

    /// Subscription requests for every output of the profile.
    ///
    /// Gas-class outputs always run at the scan rate unless disabled.
    pub fn requests(self, rate: SampleRate) -> Vec<SubscriptionRequest> {
        let rate = match (self, rate) {
            (_, SampleRate::Disabled) => SampleRate::Disabled,
            (FusionProfile::GasClasses, _) => SampleRate::Scan,
            (FusionProfile::AirQuality, r) => r,
        };
        self.outputs()
            .iter()
            .map(|&output| SubscriptionRequest {
                output_id: output.id(),
                sample_rate: rate,
            })
            .collect()
    }

    pub fn mode_write(self) -> ModeWrite {
        match self {
            FusionProfile::AirQuality => ModeWrite::OnTrigger,
            FusionProfile::GasClasses => ModeWrite::BeforeConfig,
        }
    }

    /// Mode used for the heater configuration when the engine asks for sleep.
    pub fn heater_mode(self) -> OperatingMode {
        match self {
            FusionProfile::AirQuality => OperatingMode::Forced,
            FusionProfile::GasClasses => OperatingMode::Parallel,
        }
    }

    /// Whether the engine may request forced mode under this profile.
    pub fn allows_forced(self) -> bool {
        self == FusionProfile::AirQuality
    }
}

impl fmt::Display for FusionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FusionProfile::AirQuality => write!(f, "air-quality"),
            FusionProfile::GasClasses => write!(f, "gas-classes"),
        }
    }
}
