//! Sensor session: one device, one fusion engine instance, and everything
//! the orchestration needs to remember between calls.

use crate::core::control::{ambient_from, assemble_inputs, heater_for_decision};
use crate::core::heater::{shared_heater_duration, HeaterProfile, HeaterSetup};
use crate::core::scheduler::Scheduler;
use crate::core::settings::DeviceSettings;
use crate::core::stats::{SessionLog, SessionStats};
use crate::core::validity::ValidityFilter;
use crate::device::{
    Calibration, DeviceError, MeasurementField, OperatingMode, SensorInterface, Variant, CHIP_ID,
    REG_UNIQUE_ID,
};
use crate::error::{Error, Result};
use crate::fusion::{
    EngineBuffers, EngineStatus, EngineVersion, FusedSample, FusionEngine, FusionProfile,
    ModeWrite, OutputId, RequiredInput, SampleRate, SubscriptionRequest,
};
use crate::persistence::{read_config_file, BlobStore, PersistenceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default offset between sensor die and ambient temperature, in °C.
pub const DEFAULT_TEMP_OFFSET: i8 = 5;

/// Ambient temperature assumed before the first measurement, in °C.
const REFERENCE_TEMPERATURE: i8 = 25;

/// One record of a raw (non-fusion) measurement cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub sample_nr: u32,
    /// Milliseconds since the session was created
    pub timestamp_ms: u64,
    /// °C
    pub temperature: f64,
    /// hPa
    pub pressure: f64,
    /// %rH
    pub humidity: f64,
    /// kΩ
    pub gas_resistance: f64,
    pub gas_index: u8,
    pub meas_index: u8,
    pub status: u8,
}

impl RawSample {
    fn from_field(sample_nr: u32, timestamp_ms: u64, field: &MeasurementField) -> Self {
        Self {
            sample_nr,
            timestamp_ms,
            temperature: f64::from(field.temperature),
            pressure: f64::from(field.pressure) / 100.0,
            humidity: f64::from(field.humidity),
            gas_resistance: f64::from(field.gas_resistance) / 1000.0,
            gas_index: field.gas_index,
            meas_index: field.meas_index,
            status: field.status,
        }
    }
}

pub struct SensorSession<D: SensorInterface, E: FusionEngine> {
    device: D,
    engine: E,
    sensor_id: String,
    calibration: Calibration,
    chip_id: u8,
    variant: Variant,
    /// Mode last written to the device
    mode: OperatingMode,
    /// Mode the heater profile was configured for
    configured_mode: OperatingMode,
    settings: DeviceSettings,
    heater: HeaterProfile,
    filter: ValidityFilter,
    scheduler: Scheduler,
    sample_count: u32,
    next_call_ns: i64,
    temp_offset: i8,
    ambient_temperature: i8,
    profile: FusionProfile,
    buffers: EngineBuffers,
    log: SessionLog,
    epoch: Instant,
}

impl<D: SensorInterface, E: FusionEngine> SensorSession<D, E> {
    /// Initialize the device and the engine and apply default settings.
    pub fn new(mut device: D, mut engine: E, sensor_id: impl Into<String>) -> Result<Self> {
        let sensor_id = sensor_id.into();

        let info = device.init()?;
        if info.chip_id != CHIP_ID {
            return Err(DeviceError::UnknownChip(info.chip_id).into());
        }
        let variant = Variant::from_variant_id(info.variant_id)?;

        engine
            .init()
            .map_err(|status| Error::engine("init", status))?;

        let settings = DeviceSettings::default();
        device.set_config(&settings)?;

        let buffers = EngineBuffers::for_engine(&engine);
        info!(
            sensor = %sensor_id,
            %variant,
            engine = %engine.version(),
            "sensor session initialized"
        );

        Ok(Self {
            device,
            engine,
            sensor_id,
            calibration: info.calibration,
            chip_id: info.chip_id,
            variant,
            mode: OperatingMode::Sleep,
            configured_mode: OperatingMode::Sleep,
            settings,
            heater: HeaterProfile::disabled(),
            filter: ValidityFilter::new(),
            scheduler: Scheduler::unlimited(),
            sample_count: 0,
            next_call_ns: 0,
            temp_offset: DEFAULT_TEMP_OFFSET,
            ambient_temperature: REFERENCE_TEMPERATURE - DEFAULT_TEMP_OFFSET,
            profile: FusionProfile::default(),
            buffers,
            log: SessionLog::new(),
            epoch: Instant::now(),
        })
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Record activity into `log` (e.g. one loaded with previous totals).
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    /// Apply up to five positional register codes (see [`DeviceSettings::with_overrides`]).
    ///
    /// The stored settings change only if the device accepted them.
    pub fn set_device_config(&mut self, codes: &[u8]) -> Result<()> {
        let next = self.settings.with_overrides(codes)?;
        self.device.set_config(&next)?;
        self.settings = next;
        debug!(settings = ?next, "device settings applied");
        Ok(())
    }

    /// Validate and write a heater configuration. The mode is written on the
    /// next [`measure`](Self::measure).
    pub fn configure_heater(&mut self, setup: HeaterSetup) -> Result<()> {
        let mode = setup.mode();
        if !self.variant.supports_mode(mode) {
            return Err(Error::ConfigValidation(format!(
                "{} does not support {mode:?} mode",
                self.variant
            )));
        }

        let profile = match &setup {
            HeaterSetup::Forced {
                temperature,
                duration,
            } => HeaterProfile::forced(*temperature, *duration)?,
            HeaterSetup::Parallel {
                temperatures,
                durations,
            } => {
                let meas_us = self
                    .device
                    .measurement_duration_us(OperatingMode::Parallel, &self.settings);
                HeaterProfile::parallel(temperatures, durations, shared_heater_duration(meas_us))?
            }
            HeaterSetup::Sequential {
                temperatures,
                durations,
            } => HeaterProfile::sequential(temperatures, durations)?,
        };

        self.device
            .set_heater_config(&profile, mode, self.ambient_temperature)?;
        info!(?mode, steps = profile.len(), "heater configured");
        self.heater = profile;
        self.configured_mode = mode;
        Ok(())
    }

    /// Compensation offset between die and ambient temperature.
    pub fn set_temp_offset(&mut self, offset: i8) {
        self.temp_offset = offset;
        self.ambient_temperature = REFERENCE_TEMPERATURE.saturating_sub(offset);
    }

    /// Run one raw measurement cycle in the configured mode.
    pub fn measure(&mut self) -> Result<Vec<RawSample>> {
        let mode = self.configured_mode;
        if mode == OperatingMode::Sleep {
            return Err(Error::ConfigValidation(
                "no heater configured; call configure_heater first".to_string(),
            ));
        }
        self.write_mode(mode)?;

        let epoch = self.epoch;
        let Self {
            device,
            settings,
            heater,
            filter,
            scheduler,
            sample_count,
            ..
        } = self;
        let mut samples = Vec::new();
        let run = scheduler.acquire(device, mode, settings, heater, filter, |field| {
            *sample_count += 1;
            samples.push(RawSample::from_field(
                *sample_count,
                epoch.elapsed().as_millis() as u64,
                field,
            ));
            Ok(true)
        })?;

        self.log.record_acquisition(&run);
        self.log.record_raw_samples(samples.len() as u64);
        if let Some(last) = samples.last() {
            self.ambient_temperature = ambient_from(last.temperature as f32, self.temp_offset);
        }
        Ok(samples)
    }

    /// One iteration of the fusion control loop.
    ///
    /// Returns an empty batch without touching the device if `now_ns` is
    /// before the engine's next scheduled call. A decision rejected as invalid
    /// leaves the session as it was, including the next call time.
    pub fn run_fusion(&mut self, now_ns: i64) -> Result<Vec<FusedSample>> {
        if now_ns < self.next_call_ns {
            return Ok(Vec::new());
        }

        let decision = self
            .engine
            .sensor_control(now_ns)
            .map_err(|status| Error::engine("sensor_control", status))?;
        let mode = decision.op_mode;
        debug!(
            ?mode,
            trigger = decision.trigger_measurement,
            next_call_ns = decision.next_call_ns,
            "engine decision"
        );

        if mode == OperatingMode::Forced && !self.profile.allows_forced() {
            return Err(Error::ConfigValidation(format!(
                "{} profile needs parallel mode but the engine requested forced mode",
                self.profile
            )));
        }
        if !self.variant.supports_mode(mode) {
            return Err(Error::ConfigValidation(format!(
                "{} does not support {mode:?} mode",
                self.variant
            )));
        }

        let settings = DeviceSettings::for_fusion(decision.os_hum, decision.os_pres);
        let heater_mode = if mode == OperatingMode::Sleep {
            self.profile.heater_mode()
        } else {
            mode
        };
        let parallel_meas_us = self
            .device
            .measurement_duration_us(OperatingMode::Parallel, &settings);
        let heater = heater_for_decision(&decision, heater_mode, parallel_meas_us)?;
        self.next_call_ns = decision.next_call_ns;

        let policy = self.profile.mode_write();
        if policy == ModeWrite::BeforeConfig {
            self.write_mode(mode)?;
        }
        self.device.set_config(&settings)?;
        self.settings = settings;
        self.device
            .set_heater_config(&heater, heater_mode, self.ambient_temperature)?;
        self.heater = heater;
        self.configured_mode = heater_mode;

        if !decision.trigger_measurement || mode == OperatingMode::Sleep {
            return Ok(Vec::new());
        }
        if policy == ModeWrite::OnTrigger {
            self.write_mode(mode)?;
        }

        let temp_offset = f32::from(self.temp_offset);
        let process = decision.process_data;
        let Self {
            device,
            engine,
            settings,
            heater,
            filter,
            scheduler,
            sample_count,
            log,
            ..
        } = self;
        let mut samples = Vec::new();
        let mut last_temperature = None;
        let run = scheduler.acquire(device, mode, settings, heater, filter, |field| {
            let inputs = assemble_inputs(field, process, mode, temp_offset, now_ns);
            let outcome = engine.do_steps(&inputs);
            match outcome.status {
                EngineStatus::Ok => {}
                EngineStatus::GasIndexMiss => {
                    warn!(
                        gas_index = field.gas_index,
                        meas_index = field.meas_index,
                        "fusion engine missed gas index, skipping field"
                    );
                    log.record_gas_index_miss();
                    return Ok(false);
                }
                status => return Err(Error::engine("do_steps", status)),
            }

            *sample_count += 1;
            last_temperature = Some(field.temperature);
            log.record_fused_sample();
            samples.push(FusedSample::from_outputs(
                *sample_count,
                now_ns,
                &outcome.outputs,
            ));
            Ok(true)
        })?;

        self.log.record_acquisition(&run);
        if let Some(t) = last_temperature {
            self.ambient_temperature = ambient_from(t, self.temp_offset);
        }
        Ok(samples)
    }

    fn write_mode(&mut self, mode: OperatingMode) -> Result<()> {
        self.device.set_operating_mode(mode)?;
        self.mode = mode;
        self.filter.arm();
        debug!(?mode, "operating mode written");
        Ok(())
    }

    pub fn update_subscription(
        &mut self,
        requests: &[SubscriptionRequest],
    ) -> Result<Vec<RequiredInput>> {
        let required = self
            .engine
            .update_subscription(requests)
            .map_err(|status| Error::engine("update_subscription", status))?;
        debug!(
            requested = requests.len(),
            required = required.len(),
            "subscription updated"
        );
        Ok(required)
    }

    /// Subscribe to every output of `profile` and make it the active profile.
    pub fn subscribe_profile(
        &mut self,
        profile: FusionProfile,
        rate: SampleRate,
    ) -> Result<Vec<RequiredInput>> {
        let required = self.update_subscription(&profile.requests(rate))?;
        self.profile = profile;
        info!(%profile, ?rate, "subscribed fusion profile");
        Ok(required)
    }

    /// Re-subscribe the active profile at a new rate.
    pub fn set_sample_rate(&mut self, rate: SampleRate) -> Result<Vec<RequiredInput>> {
        self.subscribe_profile(self.profile, rate)
    }

    /// Subscribe to the first `count` gas estimates plus the raw gas index.
    pub fn subscribe_gas_estimates(&mut self, count: usize) -> Result<Vec<RequiredInput>> {
        if count > OutputId::GAS_ESTIMATES.len() {
            return Err(Error::ConfigValidation(format!(
                "at most {} gas estimates exist, {count} requested",
                OutputId::GAS_ESTIMATES.len()
            )));
        }
        let requests = gas_requests(&OutputId::GAS_ESTIMATES[..count], SampleRate::Scan);
        let required = self.update_subscription(&requests)?;
        self.profile = FusionProfile::GasClasses;
        Ok(required)
    }

    /// Switch all four gas estimates (and the raw gas index) on or off.
    pub fn set_gas_estimates_enabled(&mut self, enabled: bool) -> Result<Vec<RequiredInput>> {
        let rate = if enabled {
            SampleRate::Scan
        } else {
            SampleRate::Disabled
        };
        let required = self.update_subscription(&gas_requests(&OutputId::GAS_ESTIMATES, rate))?;
        if enabled {
            self.profile = FusionProfile::GasClasses;
        }
        Ok(required)
    }

    pub fn fusion_config(&mut self) -> Result<Vec<u8>> {
        let max = self.engine.max_config_size();
        let EngineBuffers { blob, work } = &mut self.buffers;
        let len = self
            .engine
            .configuration(&mut blob[..max], work)
            .map_err(|status| Error::engine("configuration", status))?;
        Ok(blob[..len.min(max)].to_vec())
    }

    pub fn set_fusion_config(&mut self, config: &[u8]) -> Result<()> {
        let max = self.engine.max_config_size();
        if config.is_empty() || config.len() > max {
            return Err(Error::ConfigValidation(format!(
                "configuration must be 1..={max} bytes, got {}",
                config.len()
            )));
        }
        self.engine
            .set_configuration(config, &mut self.buffers.work)
            .map_err(|status| Error::engine("set_configuration", status))
    }

    pub fn fusion_state(&mut self) -> Result<Vec<u8>> {
        let max = self.engine.max_state_size();
        let EngineBuffers { blob, work } = &mut self.buffers;
        let len = self
            .engine
            .state(&mut blob[..max], work)
            .map_err(|status| Error::engine("state", status))?;
        Ok(blob[..len.min(max)].to_vec())
    }

    pub fn set_fusion_state(&mut self, state: &[u8]) -> Result<()> {
        let max = self.engine.max_state_size();
        if state.is_empty() || state.len() > max {
            return Err(Error::ConfigValidation(format!(
                "state must be 1..={max} bytes, got {}",
                state.len()
            )));
        }
        self.engine
            .set_state(state, &mut self.buffers.work)
            .map_err(|status| Error::engine("set_state", status))
    }

    /// Apply the saved configuration. `Ok(false)` if none was saved.
    pub fn load_config(&mut self, store: &BlobStore) -> Result<bool> {
        let max = self.engine.max_config_size();
        let Some(blob) = store.read_config(&self.sensor_id, max)? else {
            info!(sensor = %self.sensor_id, "no saved fusion configuration");
            return Ok(false);
        };
        self.apply_config_file(&blob, store.config_path(&self.sensor_id))?;
        Ok(true)
    }

    /// Apply a configuration file from an arbitrary path. The file must exist.
    pub fn load_config_from_path(&mut self, path: &Path) -> Result<()> {
        let max = self.engine.max_config_size();
        let blob = read_config_file(path, max)?.ok_or_else(|| PersistenceError::Read {
            path: path.to_path_buf(),
            source: std::io::ErrorKind::NotFound.into(),
        })?;
        self.apply_config_file(&blob, path.to_path_buf())
    }

    fn apply_config_file(&mut self, blob: &[u8], path: PathBuf) -> Result<()> {
        self.engine
            .set_configuration(blob, &mut self.buffers.work)
            .map_err(|status| PersistenceError::Rejected {
                what: "configuration",
                path: path.clone(),
                status,
            })?;
        info!(path = %path.display(), bytes = blob.len(), "loaded fusion configuration");
        Ok(())
    }

    pub fn save_config(&mut self, store: &BlobStore) -> Result<PathBuf> {
        let blob = self.fusion_config()?;
        Ok(store.write_config(&self.sensor_id, &blob)?)
    }

    /// Restore the saved state. `Ok(false)` if none was saved.
    pub fn load_state(&mut self, store: &BlobStore) -> Result<bool> {
        let max = self.engine.max_state_size();
        let Some(blob) = store.read_state(&self.sensor_id, max)? else {
            info!(sensor = %self.sensor_id, "no saved fusion state");
            return Ok(false);
        };
        let path = store.state_path(&self.sensor_id);
        self.engine
            .set_state(&blob, &mut self.buffers.work)
            .map_err(|status| PersistenceError::Rejected {
                what: "state",
                path: path.clone(),
                status,
            })?;
        info!(path = %path.display(), bytes = blob.len(), "loaded fusion state");
        Ok(true)
    }

    pub fn save_state(&mut self, store: &BlobStore) -> Result<PathBuf> {
        let blob = self.fusion_state()?;
        Ok(store.write_state(&self.sensor_id, &blob)?)
    }

    /// Factory unique id: four bytes at register 0x83, most significant first.
    pub fn sensor_unique_id(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.device.read(REG_UNIQUE_ID, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn chip_id(&self) -> u8 {
        self.chip_id
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn engine_version(&self) -> EngineVersion {
        self.engine.version()
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn heater(&self) -> &HeaterProfile {
        &self.heater
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn profile(&self) -> FusionProfile {
        self.profile
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn next_call_ns(&self) -> i64 {
        self.next_call_ns
    }

    pub fn temp_offset(&self) -> i8 {
        self.temp_offset
    }

    pub fn ambient_temperature(&self) -> i8 {
        self.ambient_temperature
    }

    pub fn last_accepted_index(&self) -> Option<u8> {
        self.filter.last_accepted()
    }

    /// Nanoseconds since the session was created; the control loop clock.
    pub fn now_ns(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    pub fn stats(&self) -> SessionStats {
        self.log.stats()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

fn gas_requests(estimates: &[OutputId], rate: SampleRate) -> Vec<SubscriptionRequest> {
    estimates
        .iter()
        .chain(std::iter::once(&OutputId::RawGasIndex))
        .map(|output| SubscriptionRequest {
            output_id: output.id(),
            sample_rate: rate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, SimulatedSensor, STATUS_VALID_DATA};
    use crate::fusion::{FusionDecision, ProcessData, SimulatedEngine};

    fn session() -> SensorSession<SimulatedSensor, SimulatedEngine> {
        SensorSession::new(
            SimulatedSensor::default(),
            SimulatedEngine::default(),
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_new_applies_defaults() {
        let session = session();
        assert_eq!(session.variant(), Variant::Bme690);
        assert_eq!(session.chip_id(), CHIP_ID);
        assert_eq!(session.operating_mode(), OperatingMode::Sleep);
        assert_eq!(*session.settings(), DeviceSettings::default());
        assert_eq!(session.temp_offset(), DEFAULT_TEMP_OFFSET);
        assert_eq!(session.ambient_temperature(), 20);
        assert!(session
            .device()
            .calls()
            .contains(&DeviceCall::SetConfig(DeviceSettings::default())));
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let result = SensorSession::new(SimulatedSensor::new(0x07), SimulatedEngine::default(), "x");
        assert!(matches!(
            result,
            Err(Error::DeviceIo(DeviceError::UnknownVariant(0x07)))
        ));
    }

    #[test]
    fn test_bme680_rejects_parallel() {
        let mut session =
            SensorSession::new(SimulatedSensor::new(0x00), SimulatedEngine::default(), "old")
                .unwrap();
        session.device_mut().clear_calls();
        let err = session
            .configure_heater(HeaterSetup::Parallel {
                temperatures: vec![320],
                durations: vec![5],
            })
            .unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
        assert!(session.device().calls().is_empty());
    }

    #[test]
    fn test_set_device_config_partial() {
        let mut session = session();
        session.set_device_config(&[1, 2]).unwrap();
        assert_eq!(session.settings().os_hum.code(), 1);
        assert_eq!(session.settings().os_pres.code(), 2);
        assert!(session.set_device_config(&[9]).is_err());
        assert_eq!(session.settings().os_hum.code(), 1);
    }

    #[test]
    fn test_measure_requires_heater() {
        let mut session = session();
        assert!(matches!(
            session.measure(),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_sequential_measure_collects_profile() {
        let mut session = session();
        session
            .configure_heater(HeaterSetup::Sequential {
                temperatures: vec![200, 250, 300],
                durations: vec![100, 100, 100],
            })
            .unwrap();
        let samples = session.measure().unwrap();
        let indices: Vec<u8> = samples.iter().map(|s| s.gas_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(session.sample_count(), 3);
        assert_eq!(session.operating_mode(), OperatingMode::Sequential);
    }

    #[test]
    fn test_raw_sample_units() {
        let field = MeasurementField {
            temperature: 21.5,
            pressure: 101_325.0,
            humidity: 40.0,
            gas_resistance: 52_000.0,
            gas_index: 0,
            meas_index: 0,
            status: STATUS_VALID_DATA,
        };
        let sample = RawSample::from_field(1, 0, &field);
        assert!((sample.pressure - 1013.25).abs() < 1e-6);
        assert!((sample.gas_resistance - 52.0).abs() < 1e-6);
    }

    #[test]
    fn test_unique_id_big_endian() {
        let mut session = session();
        assert_eq!(session.sensor_unique_id().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_temp_offset_moves_ambient() {
        let mut session = session();
        session.set_temp_offset(3);
        assert_eq!(session.ambient_temperature(), 22);
    }

    #[test]
    fn test_gas_estimate_count_bounded() {
        let mut session = session();
        assert!(session.subscribe_gas_estimates(5).is_err());
        session.subscribe_gas_estimates(2).unwrap();
        assert_eq!(session.profile(), FusionProfile::GasClasses);
        assert_eq!(session.engine().subscriptions().len(), 3);
    }

    #[test]
    fn test_gas_classes_reject_forced() {
        let mut session = session();
        session
            .subscribe_profile(FusionProfile::GasClasses, SampleRate::Scan)
            .unwrap();
        let mut decision = FusionDecision::idle(1_000);
        decision.op_mode = OperatingMode::Forced;
        decision.trigger_measurement = true;
        session.engine_mut().push_decision(decision);

        assert!(matches!(
            session.run_fusion(0),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_air_quality_writes_mode_only_on_trigger() {
        let mut session = session();
        session.device_mut().clear_calls();
        session
            .engine_mut()
            .push_decision(FusionDecision::idle(1_000));
        assert!(session.run_fusion(0).unwrap().is_empty());
        assert!(!session
            .device()
            .calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::SetMode(_))));
        assert_eq!(session.next_call_ns(), 1_000);
    }

    #[test]
    fn test_parallel_fusion_batch() {
        let mut session = SensorSession::new(
            SimulatedSensor::default(),
            SimulatedEngine::new(FusionProfile::GasClasses).with_recording(true),
            "nose",
        )
        .unwrap();
        session
            .subscribe_profile(FusionProfile::GasClasses, SampleRate::Scan)
            .unwrap();
        let batch = session.run_fusion(0).unwrap();
        assert_eq!(batch.len(), 10);
        assert_eq!(batch[9].sample_nr, 10);
        assert!(batch[0].get(OutputId::GasEstimate1).is_some());

        let calls = session.device().calls();
        let mode_pos = calls
            .iter()
            .position(|c| *c == DeviceCall::SetMode(OperatingMode::Parallel))
            .unwrap();
        let heater_pos = calls
            .iter()
            .position(|c| matches!(c, DeviceCall::SetHeater { .. }))
            .unwrap();
        assert!(mode_pos < heater_pos);
    }

    #[test]
    fn test_process_bits_forwarded() {
        let mut session = session();
        session
            .subscribe_profile(FusionProfile::AirQuality, SampleRate::LowPower)
            .unwrap();
        let decision = FusionDecision {
            op_mode: OperatingMode::Forced,
            trigger_measurement: true,
            run_gas: true,
            heater_temperature: 320,
            heater_duration: 150,
            process_data: ProcessData::PRESSURE,
            ..FusionDecision::idle(5)
        };
        session.engine_mut().push_decision(decision);
        session.run_fusion(0).unwrap();
        let received = session.engine().received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 1);
    }
}
