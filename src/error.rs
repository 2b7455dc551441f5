//! Error types for the voice effect core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// The resampling engine behind the pitch/speed processor could not be built
    #[error("Pitch engine init error: {0}")]
    PitchEngineInit(String),

    /// The resampling engine failed while feeding or draining samples
    #[error("Pitch engine error: {0}")]
    PitchEngineProcess(String),

    /// A frame was submitted to a worker that has already shut down
    #[error("Source worker stopped")]
    WorkerStopped,

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DspError {
    /// True for failures of the pitch/speed stage, where the caller may still
    /// choose to pass the unshifted audio through.
    pub fn is_pitch_failure(&self) -> bool {
        matches!(self, DspError::PitchEngineInit(_) | DspError::PitchEngineProcess(_))
    }
}

pub type Result<T> = std::result::Result<T, DspError>;
