//! Error type shared by every sensor-session operation.

use crate::device::DeviceError;
use crate::fusion::EngineStatus;
use crate::persistence::PersistenceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any device I/O; the session is unchanged.
    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    /// Transport or `get_data` failure. The operating mode stays as last set.
    #[error("device I/O error: {0}")]
    DeviceIo(#[from] DeviceError),

    #[error("fusion engine {operation} failed: {status}")]
    FusionEngine {
        operation: &'static str,
        status: EngineStatus,
    },

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl Error {
    pub(crate) fn engine(operation: &'static str, status: EngineStatus) -> Self {
        Error::FusionEngine { operation, status }
    }
}
