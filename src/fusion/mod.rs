//! Sensor-fusion engine integration.
//!
//! The engine itself is an opaque library. This module defines the seam
//! ([`FusionEngine`]), the data crossing it, the table of named outputs,
//! the two supported fusion profiles, and a deterministic simulated engine.

mod engine;
pub mod outputs;
pub mod profile;
pub mod simulated;
pub mod types;

pub use engine::{EngineBuffers, FusionEngine};
pub use outputs::{FusedSample, FusedValue, OutputId};
pub use profile::{FusionProfile, ModeWrite};
pub use simulated::SimulatedEngine;
pub use types::{
    EngineStatus, EngineVersion, FusionDecision, FusionInput, FusionOutput, InputKind,
    ProcessData, RequiredInput, SampleRate, StepOutcome, SubscriptionRequest, MAX_CONFIG_SIZE,
    MAX_STATE_SIZE, MAX_WORK_BUFFER_SIZE,
};
