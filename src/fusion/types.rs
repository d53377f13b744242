//! Data exchanged with the fusion engine.

use crate::core::settings::Oversampling;
use crate::device::OperatingMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest configuration blob an engine accepts, in bytes.
pub const MAX_CONFIG_SIZE: usize = 2005;

/// Largest state blob an engine produces, in bytes.
pub const MAX_STATE_SIZE: usize = 197;

/// Scratch space handed to the engine for (de)serialization.
pub const MAX_WORK_BUFFER_SIZE: usize = 4096;

/// Result code reported by the fusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Ok,
    /// The gas index of the field did not match the profile step the engine
    /// expected. The field is skipped and the batch continues.
    GasIndexMiss,
    /// Positive engine code
    Warning(i32),
    /// Negative engine code
    Error(i32),
}

impl EngineStatus {
    /// Map a raw engine return code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => EngineStatus::Ok,
            100 => EngineStatus::GasIndexMiss,
            c if c > 0 => EngineStatus::Warning(c),
            c => EngineStatus::Error(c),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            EngineStatus::Ok => 0,
            EngineStatus::GasIndexMiss => 100,
            EngineStatus::Warning(c) | EngineStatus::Error(c) => c,
        }
    }

    pub fn is_ok(self) -> bool {
        self == EngineStatus::Ok
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Ok => write!(f, "ok"),
            EngineStatus::GasIndexMiss => write!(f, "gas index miss (code 100)"),
            EngineStatus::Warning(c) => write!(f, "warning code {c}"),
            EngineStatus::Error(c) => write!(f, "error code {c}"),
        }
    }
}

/// Engine library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u8,
    pub minor: u8,
    pub major_bugfix: u8,
    pub minor_bugfix: u8,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.major_bugfix, self.minor_bugfix
        )
    }
}

/// Physical input signal kinds accepted by `do_steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Pressure in Pa
    Pressure,
    /// Relative humidity in %
    Humidity,
    /// Temperature in °C
    Temperature,
    /// Gas resistance in Ω
    GasResistor,
    /// Heat source offset in °C, subtracted from the temperature
    HeatSource,
    /// Heater profile step the gas field belongs to
    ProfilePart,
}

impl InputKind {
    pub fn id(self) -> u8 {
        match self {
            InputKind::Pressure => 1,
            InputKind::Humidity => 2,
            InputKind::Temperature => 3,
            InputKind::GasResistor => 4,
            InputKind::HeatSource => 14,
            InputKind::ProfilePart => 24,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            1 => InputKind::Pressure,
            2 => InputKind::Humidity,
            3 => InputKind::Temperature,
            4 => InputKind::GasResistor,
            14 => InputKind::HeatSource,
            24 => InputKind::ProfilePart,
            _ => return None,
        })
    }
}

/// One timestamped input signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionInput {
    pub kind: InputKind,
    pub signal: f32,
    pub timestamp_ns: i64,
}

/// One output produced by a step. `output_id` is the raw engine identifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionOutput {
    pub output_id: u8,
    pub signal: f32,
    pub accuracy: u8,
    pub timestamp_ns: i64,
}

/// Result of one `do_steps` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub outputs: Vec<FusionOutput>,
    pub status: EngineStatus,
}

impl StepOutcome {
    pub fn ok(outputs: Vec<FusionOutput>) -> Self {
        Self {
            outputs,
            status: EngineStatus::Ok,
        }
    }

    /// No outputs, just a status.
    pub fn status(status: EngineStatus) -> Self {
        Self {
            outputs: Vec::new(),
            status,
        }
    }
}

/// Bit set telling which signals of a field the engine wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessData(pub u32);

impl ProcessData {
    pub const PRESSURE: ProcessData = ProcessData(1);
    pub const HUMIDITY: ProcessData = ProcessData(1 << 1);
    pub const TEMPERATURE: ProcessData = ProcessData(1 << 2);
    pub const GAS: ProcessData = ProcessData(1 << 3);
    pub const ALL: ProcessData = ProcessData(0b1111);

    pub fn contains(self, other: ProcessData) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ProcessData {
    type Output = ProcessData;

    fn bitor(self, rhs: ProcessData) -> ProcessData {
        ProcessData(self.0 | rhs.0)
    }
}

/// What the engine wants the device to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionDecision {
    /// Engine timestamp at which `sensor_control` must be called again
    pub next_call_ns: i64,
    pub op_mode: OperatingMode,
    pub trigger_measurement: bool,
    pub os_hum: Oversampling,
    pub os_pres: Oversampling,
    pub run_gas: bool,
    /// Forced-mode heater set-point
    pub heater_temperature: u16,
    pub heater_duration: u16,
    /// Parallel/sequential heater profile
    pub heater_temperature_profile: Vec<u16>,
    pub heater_duration_profile: Vec<u16>,
    pub process_data: ProcessData,
}

impl FusionDecision {
    /// A decision that does nothing until `next_call_ns`.
    pub fn idle(next_call_ns: i64) -> Self {
        Self {
            next_call_ns,
            op_mode: OperatingMode::Sleep,
            trigger_measurement: false,
            os_hum: Oversampling::Skipped,
            os_pres: Oversampling::Skipped,
            run_gas: false,
            heater_temperature: 0,
            heater_duration: 0,
            heater_temperature_profile: Vec::new(),
            heater_duration_profile: Vec::new(),
            process_data: ProcessData::default(),
        }
    }
}

/// Output sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    Disabled,
    /// One sample every 300 s
    UltraLowPower,
    /// One sample every 3 s
    LowPower,
    Continuous,
    /// Gas-class scanning
    Scan,
}

impl SampleRate {
    /// Rate in Hz as the engine understands it.
    pub fn hz(self) -> f32 {
        match self {
            SampleRate::Disabled => 65535.0,
            SampleRate::UltraLowPower => 0.003_333_3,
            SampleRate::LowPower => 0.333_33,
            SampleRate::Continuous => 1.0,
            SampleRate::Scan => 0.055_556,
        }
    }

    pub fn is_disabled(self) -> bool {
        self == SampleRate::Disabled
    }
}

/// Output the caller wants, and how often.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub output_id: u8,
    pub sample_rate: SampleRate,
}

/// Physical input the engine needs to satisfy the current subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequiredInput {
    pub input_id: u8,
    pub sample_rate: f32,
}
