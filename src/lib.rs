//! BME69x Agent - heater duty-cycle orchestration for BME68x/69x gas sensors.
//!
//! This library drives a gas sensor through forced, parallel and sequential
//! heater profiles and feeds the resulting fields into a sensor-fusion
//! engine that turns them into air-quality and gas-class estimates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Sensor Session                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Fusion    │──▶│   Heater /  │──▶│  Scheduler  │       │
//! │  │   Engine    │   │  Settings   │   │ (poll loop) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲                                    │              │
//! │         │                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │ Persistence │                     │  Validity   │       │
//! │  │ (conf/state)│                     │   Filter    │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bme69x_agent::{FusionProfile, SampleRate, SensorSession, SimulatedEngine, SimulatedSensor};
//!
//! let mut session = SensorSession::new(
//!     SimulatedSensor::default(),
//!     SimulatedEngine::new(FusionProfile::AirQuality),
//!     "sensor_0x76",
//! )?;
//! session.subscribe_profile(FusionProfile::AirQuality, SampleRate::LowPower)?;
//!
//! let now = session.now_ns();
//! for sample in session.run_fusion(now)? {
//!     println!("{}: {:?}", sample.sample_nr, sample.values);
//! }
//! # Ok::<(), bme69x_agent::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod fusion;
pub mod persistence;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SensorConfig};
pub use core::{
    DeviceSettings, HeaterProfile, HeaterSetup, RawSample, Scheduler, SensorSession, SessionLog,
    SessionStats,
};
pub use device::{
    DeviceError, MeasurementField, OperatingMode, SensorInterface, SimulatedSensor, Variant,
};
pub use error::{Error, Result};
pub use fusion::{
    EngineStatus, FusedSample, FusionEngine, FusionProfile, OutputId, SampleRate, SimulatedEngine,
};
pub use persistence::{BlobStore, PersistenceError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
