//! Pure helpers for the fusion control loop.

use crate::core::heater::{shared_heater_duration, HeaterProfile};
use crate::device::{MeasurementField, OperatingMode};
use crate::error::Result;
use crate::fusion::{FusionDecision, FusionInput, InputKind, ProcessData};

/// Build the engine inputs for one accepted field.
///
/// Signals are included only if the decision asked for them. Gas resistance
/// additionally requires the gas-valid bit. In the profiled modes the profile
/// part accompanies any non-empty request.
pub fn assemble_inputs(
    field: &MeasurementField,
    process: ProcessData,
    mode: OperatingMode,
    temp_offset: f32,
    timestamp_ns: i64,
) -> Vec<FusionInput> {
    let input = |kind, signal| FusionInput {
        kind,
        signal,
        timestamp_ns,
    };

    let mut inputs = Vec::with_capacity(6);
    if process.contains(ProcessData::PRESSURE) {
        inputs.push(input(InputKind::Pressure, field.pressure));
    }
    if process.contains(ProcessData::TEMPERATURE) {
        inputs.push(input(InputKind::Temperature, field.temperature));
        inputs.push(input(InputKind::HeatSource, temp_offset));
    }
    if process.contains(ProcessData::HUMIDITY) {
        inputs.push(input(InputKind::Humidity, field.humidity));
    }
    if process.contains(ProcessData::GAS) && field.is_gas_valid() {
        inputs.push(input(InputKind::GasResistor, field.gas_resistance));
    }
    if !process.is_empty() && mode.is_profiled() {
        inputs.push(input(InputKind::ProfilePart, f32::from(field.gas_index)));
    }
    inputs
}

/// Heater profile implementing `decision` in `heater_mode`.
///
/// `parallel_meas_us` is the parallel-mode TPH duration, used for the
/// shared heating phase.
pub fn heater_for_decision(
    decision: &FusionDecision,
    heater_mode: OperatingMode,
    parallel_meas_us: u32,
) -> Result<HeaterProfile> {
    if !decision.run_gas {
        return Ok(HeaterProfile::disabled());
    }
    match heater_mode {
        OperatingMode::Parallel => HeaterProfile::parallel(
            &decision.heater_temperature_profile,
            &decision.heater_duration_profile,
            shared_heater_duration(parallel_meas_us),
        ),
        OperatingMode::Sequential => HeaterProfile::sequential(
            &decision.heater_temperature_profile,
            &decision.heater_duration_profile,
        ),
        OperatingMode::Forced | OperatingMode::Sleep => {
            HeaterProfile::forced(decision.heater_temperature, decision.heater_duration)
        }
    }
}

/// Ambient temperature fed back into the heater calculation.
pub fn ambient_from(temperature: f32, temp_offset: i8) -> i8 {
    let ambient = (temperature - f32::from(temp_offset)).round();
    ambient.clamp(f32::from(i8::MIN), f32::from(i8::MAX)) as i8
}
