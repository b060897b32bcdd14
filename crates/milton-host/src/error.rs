//! Top-level error kinds surfaced by the `milton` binary.
//!
//! `milton_thermal`'s component errors are narrower and get wrapped in here
//! via `#[from]`; `anyhow::Result` carries this the rest of the way up
//! through `main`, same as `klipper-host`'s use of `anyhow::Context`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiltonError {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("failed to parse configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("circular !include detected: {0}")]
    CircularInclude(String),

    #[error("failed to connect to power supply: {0}")]
    ConnectFailure(String),

    #[error("power supply transport timed out")]
    ProtocolTimeout,

    #[error("power supply rejected setpoint: {0}")]
    SetpointRejected(String),

    #[error("resistance unavailable: output current is not positive")]
    ResistanceUnavailable,

    #[error("calibration table missing: {0}")]
    CalibrationMissing(String),

    #[error(transparent)]
    InsufficientData(#[from] milton_thermal::FirstOrderStepError),

    #[error(transparent)]
    SearchDepthExceeded(#[from] milton_thermal::SearchError),

    #[error(transparent)]
    PiecewiseLinear(#[from] milton_thermal::PiecewiseLinearError),

    #[error("run interrupted")]
    Interrupted,
}

impl From<milton_thermal::TransportError> for MiltonError {
    fn from(e: milton_thermal::TransportError) -> Self {
        match e {
            milton_thermal::TransportError::ConnectFailure(s) => MiltonError::ConnectFailure(s),
            milton_thermal::TransportError::Timeout => MiltonError::ProtocolTimeout,
            milton_thermal::TransportError::SetpointRejected(s) => MiltonError::SetpointRejected(s),
        }
    }
}
