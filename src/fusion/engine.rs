//! The fusion engine seam.

use crate::fusion::types::{
    EngineStatus, EngineVersion, FusionDecision, FusionInput, RequiredInput, StepOutcome,
    SubscriptionRequest, MAX_CONFIG_SIZE, MAX_STATE_SIZE, MAX_WORK_BUFFER_SIZE,
};

/// Interface to a sensor-fusion library instance.
///
/// Every call returns an [`EngineStatus`] on failure; `do_steps` reports its
/// status inside the [`StepOutcome`] because a gas-index miss is not fatal.
/// The serialization calls take caller-owned output and work buffers.
pub trait FusionEngine {
    fn init(&mut self) -> Result<(), EngineStatus>;

    fn version(&self) -> EngineVersion;

    /// Subscribe to outputs; returns the physical inputs the engine now needs.
    fn update_subscription(
        &mut self,
        requests: &[SubscriptionRequest],
    ) -> Result<Vec<RequiredInput>, EngineStatus>;

    /// Ask what the device should do at `now_ns`.
    fn sensor_control(&mut self, now_ns: i64) -> Result<FusionDecision, EngineStatus>;

    fn do_steps(&mut self, inputs: &[FusionInput]) -> StepOutcome;

    /// Serialize the configuration into `out`; returns the number of bytes written.
    fn configuration(&mut self, out: &mut [u8], work: &mut [u8]) -> Result<usize, EngineStatus>;

    fn set_configuration(&mut self, blob: &[u8], work: &mut [u8]) -> Result<(), EngineStatus>;

    /// Serialize the learned state into `out`; returns the number of bytes written.
    fn state(&mut self, out: &mut [u8], work: &mut [u8]) -> Result<usize, EngineStatus>;

    fn set_state(&mut self, blob: &[u8], work: &mut [u8]) -> Result<(), EngineStatus>;

    fn max_config_size(&self) -> usize {
        MAX_CONFIG_SIZE
    }

    fn max_state_size(&self) -> usize {
        MAX_STATE_SIZE
    }
}

/// Serialization buffers owned by one session.
#[derive(Debug, Clone)]
pub struct EngineBuffers {
    pub blob: Vec<u8>,
    pub work: Vec<u8>,
}

impl EngineBuffers {
    /// Size the blob buffer for whichever of config/state is larger.
    pub fn for_engine<E: FusionEngine + ?Sized>(engine: &E) -> Self {
        let blob_len = engine.max_config_size().max(engine.max_state_size());
        Self {
            blob: vec![0u8; blob_len],
            work: vec![0u8; MAX_WORK_BUFFER_SIZE],
        }
    }
}
