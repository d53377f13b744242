//! Physical sensor interface for the BME69x agent.
//!
//! The orchestration core never touches a bus directly. Everything it needs
//! from the chip goes through [`SensorInterface`]; a simulated implementation
//! is provided so the core runs without hardware.

pub mod simulated;
pub mod types;

use crate::core::heater::HeaterProfile;
use crate::core::settings::DeviceSettings;

// Re-export commonly used types
pub use simulated::{DeviceCall, SimulatedSensor};
pub use types::{
    Calibration, ChipInfo, DeviceError, MeasurementField, OperatingMode, Variant, CHIP_ID,
    REG_UNIQUE_ID, STATUS_GAS_VALID, STATUS_HEATER_STABLE, STATUS_NEW_DATA, STATUS_VALID_DATA,
};

/// Register access, timing and measurement primitives of one physical sensor.
///
/// Implementations block: `delay_us` sleeps the calling thread and
/// `get_data` performs the bus transfer before returning.
pub trait SensorInterface {
    /// Read `buf.len()` bytes starting at `reg`.
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Write `data` starting at `reg`.
    fn write(&mut self, reg: u8, data: &[u8]) -> Result<(), DeviceError>;

    /// Block for the given number of microseconds.
    fn delay_us(&mut self, micros: u32);

    /// Soft-reset the chip and read its identity and calibration.
    fn init(&mut self) -> Result<ChipInfo, DeviceError>;

    /// TPH measurement duration for `mode` under `settings`, in microseconds.
    fn measurement_duration_us(&mut self, mode: OperatingMode, settings: &DeviceSettings) -> u32;

    fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), DeviceError>;

    /// Write oversampling, filter and ODR registers.
    fn set_config(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError>;

    /// Write heater set-points for `mode`.
    ///
    /// `ambient_temperature` seeds the heater resistance calculation.
    fn set_heater_config(
        &mut self,
        profile: &HeaterProfile,
        mode: OperatingMode,
        ambient_temperature: i8,
    ) -> Result<(), DeviceError>;

    /// Read whatever fields the chip has ready for `mode`.
    fn get_data(&mut self, mode: OperatingMode) -> Result<Vec<MeasurementField>, DeviceError>;
}
