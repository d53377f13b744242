//! Orchestration core for the BME69x agent.
//!
//! This module contains:
//! - Device settings and heater profile validation
//! - Duty-cycle scheduling and stale-field filtering
//! - The sensor session and its fusion control loop

pub mod control;
pub mod heater;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod stats;
pub mod validity;

// Re-export commonly used types
pub use heater::{HeaterProfile, HeaterSetup, HeaterStep, MAX_PROFILE_LEN};
pub use scheduler::{measurement_delay_us, Acquisition, Scheduler};
pub use session::{RawSample, SensorSession, DEFAULT_TEMP_OFFSET};
pub use settings::{DeviceSettings, Filter, OutputDataRate, Oversampling};
pub use stats::{SessionLog, SessionStats};
pub use validity::ValidityFilter;
