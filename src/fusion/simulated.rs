//! Deterministic stand-in for the proprietary fusion library.
//!
//! Outputs are simple functions of the inputs, so runs are reproducible. The
//! engine can be scripted with decisions and statuses for tests.

use crate::core::settings::Oversampling;
use crate::device::OperatingMode;
use crate::fusion::engine::FusionEngine;
use crate::fusion::outputs::OutputId;
use crate::fusion::profile::FusionProfile;
use crate::fusion::types::{
    EngineStatus, EngineVersion, FusionDecision, FusionInput, FusionOutput, InputKind,
    ProcessData, RequiredInput, StepOutcome, SubscriptionRequest, MAX_CONFIG_SIZE,
};
use std::collections::{HashMap, VecDeque};

/// Heater set-point used in forced mode.
pub const FORCED_HEATER: (u16, u16) = (320, 150);

/// Ten-step parallel profile used for gas-class scanning.
pub const SCAN_TEMPERATURES: [u16; 10] = [320, 100, 100, 100, 200, 200, 200, 320, 320, 320];
pub const SCAN_DURATIONS: [u16; 10] = [5, 2, 10, 30, 5, 5, 5, 5, 5, 5];

const STATE_MAGIC: &[u8; 4] = b"BSIM";
const STATE_LEN: usize = 12;
const E_UNKNOWN_OUTPUT: i32 = -10;
const E_BLOB_INVALID: i32 = -37;
const E_WORK_BUFFER: i32 = -38;
const IDLE_RECHECK_NS: i64 = 1_000_000_000;

pub struct SimulatedEngine {
    profile: FusionProfile,
    config: Vec<u8>,
    subscriptions: Vec<SubscriptionRequest>,
    period_ns: Option<i64>,
    steps: u32,
    gas_baseline: f32,
    decisions: VecDeque<FusionDecision>,
    control_failures: VecDeque<EngineStatus>,
    step_statuses: VecDeque<EngineStatus>,
    recording: bool,
    received: Vec<Vec<FusionInput>>,
}

impl SimulatedEngine {
    pub fn new(profile: FusionProfile) -> Self {
        Self {
            profile,
            config: default_config(),
            subscriptions: Vec::new(),
            period_ns: None,
            steps: 0,
            gas_baseline: 0.0,
            decisions: VecDeque::new(),
            control_failures: VecDeque::new(),
            step_statuses: VecDeque::new(),
            recording: false,
            received: Vec::new(),
        }
    }

    /// Keep every input batch passed to `do_steps` for later inspection.
    ///
    /// Off by default; a long-running loop would otherwise grow without bound.
    pub fn with_recording(mut self, recording: bool) -> Self {
        self.recording = recording;
        self
    }

    /// Return `decision` from the next `sensor_control` call.
    pub fn push_decision(&mut self, decision: FusionDecision) {
        self.decisions.push_back(decision);
    }

    /// Fail the next `sensor_control` call with `status`.
    pub fn fail_next_control(&mut self, status: EngineStatus) {
        self.control_failures.push_back(status);
    }

    /// Report `status` from the next `do_steps` call.
    pub fn push_step_status(&mut self, status: EngineStatus) {
        self.step_statuses.push_back(status);
    }

    /// Input batches passed to `do_steps`, in order. Empty unless recording.
    pub fn received(&self) -> &[Vec<FusionInput>] {
        &self.received
    }

    pub fn subscriptions(&self) -> &[SubscriptionRequest] {
        &self.subscriptions
    }

    /// Number of successful steps processed since the state was last reset.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    fn scheduled_decision(&self, now_ns: i64, period_ns: i64) -> FusionDecision {
        let mut decision = FusionDecision {
            next_call_ns: now_ns + period_ns,
            trigger_measurement: true,
            os_hum: Oversampling::X1,
            os_pres: Oversampling::X1,
            run_gas: true,
            process_data: ProcessData::ALL,
            ..FusionDecision::idle(now_ns + period_ns)
        };
        match self.profile {
            FusionProfile::AirQuality => {
                decision.op_mode = OperatingMode::Forced;
                decision.heater_temperature = FORCED_HEATER.0;
                decision.heater_duration = FORCED_HEATER.1;
            }
            FusionProfile::GasClasses => {
                decision.op_mode = OperatingMode::Parallel;
                decision.heater_temperature_profile = SCAN_TEMPERATURES.to_vec();
                decision.heater_duration_profile = SCAN_DURATIONS.to_vec();
            }
        }
        decision
    }

    fn compute(&mut self, inputs: &[FusionInput]) -> Vec<FusionOutput> {
        let signals: HashMap<InputKind, f32> =
            inputs.iter().map(|i| (i.kind, i.signal)).collect();
        let timestamp_ns = inputs.first().map(|i| i.timestamp_ns).unwrap_or(0);

        self.steps = self.steps.saturating_add(1);
        let gas = signals.get(&InputKind::GasResistor).copied();
        if let Some(g) = gas {
            self.gas_baseline = self.gas_baseline.max(g);
        }
        let gas_ratio = gas
            .filter(|_| self.gas_baseline > 0.0)
            .map(|g| (g / self.gas_baseline).clamp(0.0, 1.0));
        let iaq = gas_ratio.map(|r| 25.0 + 475.0 * (1.0 - r));
        let accuracy = (self.steps / 4).min(3) as u8;
        let stabilized = if self.steps >= 5 { 1.0 } else { 0.0 };
        let heat_source = signals.get(&InputKind::HeatSource).copied().unwrap_or(0.0);

        let mut outputs = Vec::new();
        for request in &self.subscriptions {
            if request.sample_rate.is_disabled() {
                continue;
            }
            let Some(output) = OutputId::from_id(request.output_id) else {
                continue;
            };
            let value = match output {
                OutputId::Iaq | OutputId::StaticIaq => iaq,
                OutputId::Co2Equivalent => iaq.map(|v| 400.0 + v * 5.0),
                OutputId::BreathVocEquivalent => iaq.map(|v| 0.5 + v / 100.0),
                OutputId::TvocEquivalent => iaq.map(|v| v * 2.0),
                OutputId::RawTemperature => signals.get(&InputKind::Temperature).copied(),
                OutputId::RawPressure => signals.get(&InputKind::Pressure).copied(),
                OutputId::RawHumidity => signals.get(&InputKind::Humidity).copied(),
                OutputId::RawGas => gas,
                OutputId::StabilizationStatus | OutputId::RunInStatus => Some(stabilized),
                OutputId::HeatCompensatedTemperature => signals
                    .get(&InputKind::Temperature)
                    .map(|t| t - heat_source),
                OutputId::HeatCompensatedHumidity => signals.get(&InputKind::Humidity).copied(),
                OutputId::GasPercentage => gas_ratio.map(|r| r * 100.0),
                OutputId::GasEstimate1 => gas_ratio,
                OutputId::GasEstimate2 => gas_ratio.map(|r| 1.0 - r),
                OutputId::GasEstimate3 | OutputId::GasEstimate4 => gas_ratio.map(|_| 0.0),
                OutputId::RawGasIndex => signals.get(&InputKind::ProfilePart).copied(),
            };
            if let Some(signal) = value {
                outputs.push(FusionOutput {
                    output_id: output.id(),
                    signal,
                    accuracy,
                    timestamp_ns,
                });
            }
        }
        outputs
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(FusionProfile::default())
    }
}

impl FusionEngine for SimulatedEngine {
    fn init(&mut self) -> Result<(), EngineStatus> {
        self.steps = 0;
        self.gas_baseline = 0.0;
        Ok(())
    }

    fn version(&self) -> EngineVersion {
        EngineVersion {
            major: 0,
            minor: 1,
            major_bugfix: 0,
            minor_bugfix: 0,
        }
    }

    fn update_subscription(
        &mut self,
        requests: &[SubscriptionRequest],
    ) -> Result<Vec<RequiredInput>, EngineStatus> {
        if requests
            .iter()
            .any(|r| OutputId::from_id(r.output_id).is_none())
        {
            return Err(EngineStatus::Error(E_UNKNOWN_OUTPUT));
        }

        for request in requests {
            self.subscriptions.retain(|s| s.output_id != request.output_id);
            self.subscriptions.push(*request);
        }

        let fastest = self
            .subscriptions
            .iter()
            .filter(|s| !s.sample_rate.is_disabled())
            .map(|s| s.sample_rate.hz())
            .fold(0.0f32, f32::max);
        if fastest <= 0.0 {
            self.period_ns = None;
            return Ok(Vec::new());
        }
        self.period_ns = Some((1e9 / f64::from(fastest)) as i64);

        let mut kinds = vec![
            InputKind::Pressure,
            InputKind::Humidity,
            InputKind::Temperature,
            InputKind::GasResistor,
            InputKind::HeatSource,
        ];
        if self.profile == FusionProfile::GasClasses {
            kinds.push(InputKind::ProfilePart);
        }
        Ok(kinds
            .into_iter()
            .map(|k| RequiredInput {
                input_id: k.id(),
                sample_rate: fastest,
            })
            .collect())
    }

    fn sensor_control(&mut self, now_ns: i64) -> Result<FusionDecision, EngineStatus> {
        if let Some(status) = self.control_failures.pop_front() {
            return Err(status);
        }
        if let Some(decision) = self.decisions.pop_front() {
            return Ok(decision);
        }
        Ok(match self.period_ns {
            Some(period) => self.scheduled_decision(now_ns, period),
            None => FusionDecision::idle(now_ns + IDLE_RECHECK_NS),
        })
    }

    fn do_steps(&mut self, inputs: &[FusionInput]) -> StepOutcome {
        if self.recording {
            self.received.push(inputs.to_vec());
        }
        match self.step_statuses.pop_front() {
            Some(EngineStatus::Ok) | None => StepOutcome::ok(self.compute(inputs)),
            Some(status) => StepOutcome::status(status),
        }
    }

    fn configuration(&mut self, out: &mut [u8], _work: &mut [u8]) -> Result<usize, EngineStatus> {
        let len = self.config.len();
        if out.len() < len {
            return Err(EngineStatus::Error(E_WORK_BUFFER));
        }
        out[..len].copy_from_slice(&self.config);
        Ok(len)
    }

    fn set_configuration(&mut self, blob: &[u8], _work: &mut [u8]) -> Result<(), EngineStatus> {
        if blob.is_empty() || blob.len() > MAX_CONFIG_SIZE {
            return Err(EngineStatus::Error(E_BLOB_INVALID));
        }
        self.config = blob.to_vec();
        Ok(())
    }

    fn state(&mut self, out: &mut [u8], work: &mut [u8]) -> Result<usize, EngineStatus> {
        if out.len() < STATE_LEN || work.len() < STATE_LEN {
            return Err(EngineStatus::Error(E_WORK_BUFFER));
        }
        out[..4].copy_from_slice(STATE_MAGIC);
        out[4..8].copy_from_slice(&self.steps.to_le_bytes());
        out[8..12].copy_from_slice(&self.gas_baseline.to_le_bytes());
        Ok(STATE_LEN)
    }

    fn set_state(&mut self, blob: &[u8], _work: &mut [u8]) -> Result<(), EngineStatus> {
        if blob.len() != STATE_LEN || &blob[..4] != STATE_MAGIC {
            return Err(EngineStatus::Error(E_BLOB_INVALID));
        }
        let mut steps = [0u8; 4];
        steps.copy_from_slice(&blob[4..8]);
        let mut baseline = [0u8; 4];
        baseline.copy_from_slice(&blob[8..12]);
        self.steps = u32::from_le_bytes(steps);
        self.gas_baseline = f32::from_le_bytes(baseline);
        Ok(())
    }
}

fn default_config() -> Vec<u8> {
    (0..MAX_CONFIG_SIZE).map(|i| (i as u8) ^ 0x5A).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::types::{SampleRate, MAX_STATE_SIZE};

    fn input(kind: InputKind, signal: f32) -> FusionInput {
        FusionInput {
            kind,
            signal,
            timestamp_ns: 1_000,
        }
    }

    #[test]
    fn test_idle_without_subscription() {
        let mut engine = SimulatedEngine::default();
        let decision = engine.sensor_control(0).unwrap();
        assert!(!decision.trigger_measurement);
        assert_eq!(decision.op_mode, OperatingMode::Sleep);
        assert!(decision.next_call_ns > 0);
    }

    #[test]
    fn test_low_power_schedule() {
        let mut engine = SimulatedEngine::new(FusionProfile::AirQuality);
        let required = engine
            .update_subscription(&FusionProfile::AirQuality.requests(SampleRate::LowPower))
            .unwrap();
        assert_eq!(required.len(), 5);

        let decision = engine.sensor_control(10).unwrap();
        assert_eq!(decision.op_mode, OperatingMode::Forced);
        assert!(decision.trigger_measurement);
        assert_eq!(decision.heater_temperature, FORCED_HEATER.0);
        // 1 / 0.33333 Hz, roughly three seconds
        assert!((decision.next_call_ns - 10 - 3_000_000_000).abs() < 1_000_000);
    }

    #[test]
    fn test_unknown_output_rejected() {
        let mut engine = SimulatedEngine::default();
        let err = engine
            .update_subscription(&[SubscriptionRequest {
                output_id: 99,
                sample_rate: SampleRate::LowPower,
            }])
            .unwrap_err();
        assert_eq!(err, EngineStatus::Error(E_UNKNOWN_OUTPUT));
    }

    #[test]
    fn test_outputs_follow_subscription() {
        let mut engine = SimulatedEngine::new(FusionProfile::AirQuality);
        engine
            .update_subscription(&[SubscriptionRequest {
                output_id: OutputId::RawPressure.id(),
                sample_rate: SampleRate::LowPower,
            }])
            .unwrap();
        let outcome = engine.do_steps(&[
            input(InputKind::Pressure, 101_000.0),
            input(InputKind::GasResistor, 40_000.0),
        ]);
        assert!(outcome.status.is_ok());
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(outcome.outputs[0].signal, 101_000.0);
    }

    #[test]
    fn test_inputs_not_kept_without_recording() {
        let mut engine = SimulatedEngine::default();
        for _ in 0..3 {
            engine.do_steps(&[input(InputKind::Pressure, 1.0)]);
        }
        assert!(engine.received().is_empty());
        assert_eq!(engine.steps(), 3);
    }

    #[test]
    fn test_scripted_step_status() {
        let mut engine = SimulatedEngine::default().with_recording(true);
        engine.push_step_status(EngineStatus::GasIndexMiss);
        let outcome = engine.do_steps(&[input(InputKind::Pressure, 1.0)]);
        assert_eq!(outcome.status, EngineStatus::GasIndexMiss);
        assert!(outcome.outputs.is_empty());
        assert_eq!(engine.received().len(), 1);
    }

    #[test]
    fn test_state_round_trip() {
        let mut engine = SimulatedEngine::default();
        engine.do_steps(&[input(InputKind::GasResistor, 30_000.0)]);
        let mut out = [0u8; MAX_STATE_SIZE];
        let mut work = [0u8; 64];
        let len = engine.state(&mut out, &mut work).unwrap();

        let mut restored = SimulatedEngine::default();
        restored.set_state(&out[..len], &mut work).unwrap();
        assert_eq!(restored.steps(), 1);
        assert!(restored.set_state(&[0u8; 3], &mut work).is_err());
    }
}
