//! Simulated sensor interface.
//!
//! This exists so the orchestration core (and the binary) can run on machines
//! without an I2C bus. It either replays scripted poll responses or
//! synthesizes plausible fields, and it records every device interaction so
//! callers can inspect what the core actually did.

use crate::core::heater::HeaterProfile;
use crate::core::settings::DeviceSettings;
use crate::device::types::{
    Calibration, ChipInfo, DeviceError, MeasurementField, OperatingMode, CHIP_ID, REG_UNIQUE_ID,
    STATUS_VALID_DATA,
};
use crate::device::SensorInterface;
use std::collections::VecDeque;

/// Default TPH measurement duration reported by the simulation.
pub const DEFAULT_MEAS_DURATION_US: u32 = 50_000;

/// One recorded interaction with the simulated device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Read { reg: u8, len: usize },
    Write { reg: u8, len: usize },
    Delay(u32),
    Init,
    SetMode(OperatingMode),
    SetConfig(DeviceSettings),
    SetHeater {
        mode: OperatingMode,
        steps: usize,
        ambient_temperature: i8,
    },
    GetData(OperatingMode),
}

/// A sensor that never touches hardware.
pub struct SimulatedSensor {
    variant_id: u8,
    meas_duration_us: u32,
    registers: [u8; 256],
    script: VecDeque<Result<Vec<MeasurementField>, DeviceError>>,
    calls: Vec<DeviceCall>,
    mode: OperatingMode,
    profile_len: u8,
    tick: u32,
    sleep_for_real: bool,
}

impl SimulatedSensor {
    /// Create a simulated sensor reporting the given variant id.
    pub fn new(variant_id: u8) -> Self {
        let mut registers = [0u8; 256];
        let uid = REG_UNIQUE_ID as usize;
        registers[uid..uid + 4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);

        Self {
            variant_id,
            meas_duration_us: DEFAULT_MEAS_DURATION_US,
            registers,
            script: VecDeque::new(),
            calls: Vec::new(),
            mode: OperatingMode::Sleep,
            profile_len: 1,
            tick: 0,
            sleep_for_real: false,
        }
    }

    /// Report a fixed measurement duration instead of the default.
    pub fn with_measurement_duration(mut self, micros: u32) -> Self {
        self.meas_duration_us = micros;
        self
    }

    /// Actually sleep in `delay_us` (used by the binary; tests leave this off).
    pub fn with_real_delays(mut self, enabled: bool) -> Self {
        self.sleep_for_real = enabled;
        self
    }

    /// Queue the response of the next `get_data` call.
    ///
    /// Once the script is exhausted, fields are synthesized.
    pub fn push_response(&mut self, response: Result<Vec<MeasurementField>, DeviceError>) {
        self.script.push_back(response);
    }

    /// All interactions recorded so far.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Forget recorded interactions.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Delay(us) => Some(*us),
                _ => None,
            })
            .collect()
    }

    fn synthesize(&mut self, mode: OperatingMode) -> Vec<MeasurementField> {
        self.tick = self.tick.wrapping_add(1);
        let step = match mode {
            OperatingMode::Forced => 0,
            _ => ((self.tick - 1) % u32::from(self.profile_len.max(1))) as u8,
        };
        let drift = (self.tick % 20) as f32 * 0.05;

        vec![MeasurementField {
            temperature: 24.0 + drift,
            pressure: 101_325.0 - drift * 10.0,
            humidity: 45.0 + drift,
            gas_resistance: 50_000.0 + 12_500.0 * f32::from(step),
            gas_index: step,
            meas_index: step,
            status: STATUS_VALID_DATA,
        }]
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(0x02)
    }
}

impl SensorInterface for SimulatedSensor {
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Read {
            reg,
            len: buf.len(),
        });
        let start = reg as usize;
        let end = start + buf.len();
        if end > self.registers.len() {
            return Err(DeviceError::InvalidLength(buf.len()));
        }
        buf.copy_from_slice(&self.registers[start..end]);
        Ok(())
    }

    fn write(&mut self, reg: u8, data: &[u8]) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Write {
            reg,
            len: data.len(),
        });
        let start = reg as usize;
        let end = start + data.len();
        if end > self.registers.len() {
            return Err(DeviceError::InvalidLength(data.len()));
        }
        self.registers[start..end].copy_from_slice(data);
        Ok(())
    }

    fn delay_us(&mut self, micros: u32) {
        self.calls.push(DeviceCall::Delay(micros));
        if self.sleep_for_real {
            std::thread::sleep(std::time::Duration::from_micros(u64::from(micros)));
        }
    }

    fn init(&mut self) -> Result<ChipInfo, DeviceError> {
        self.calls.push(DeviceCall::Init);
        Ok(ChipInfo {
            calibration: Calibration(vec![0u8; 42]),
            chip_id: CHIP_ID,
            variant_id: self.variant_id,
        })
    }

    fn measurement_duration_us(&mut self, _mode: OperatingMode, _settings: &DeviceSettings) -> u32 {
        self.meas_duration_us
    }

    fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetMode(mode));
        self.mode = mode;
        self.tick = 0;
        Ok(())
    }

    fn set_config(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetConfig(*settings));
        Ok(())
    }

    fn set_heater_config(
        &mut self,
        profile: &HeaterProfile,
        mode: OperatingMode,
        ambient_temperature: i8,
    ) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetHeater {
            mode,
            steps: profile.len(),
            ambient_temperature,
        });
        self.profile_len = profile.len().max(1) as u8;
        Ok(())
    }

    fn get_data(&mut self, mode: OperatingMode) -> Result<Vec<MeasurementField>, DeviceError> {
        self.calls.push(DeviceCall::GetData(mode));
        if let Some(response) = self.script.pop_front() {
            return response;
        }
        if mode == OperatingMode::Sleep {
            return Ok(Vec::new());
        }
        Ok(self.synthesize(mode))
    }
}
