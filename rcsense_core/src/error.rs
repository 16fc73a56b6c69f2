use thiserror::Error;

use crate::mode::ReadMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing sensor pins")]
    MissingPins,
    #[error("missing emitter")]
    MissingEmitter,
    #[error("sensor array has no channels")]
    NoChannels,
    #[error("sensor array has {0} channels, at most 16 are supported")]
    TooManyChannels(usize),
    #[error("expected {expected} channels, pins provide {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },
    #[error("could not reserve calibration storage for {0} channels")]
    Allocation(usize),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Sensing failures reported above the sensor API: a missing calibration
/// (a silent no-op inside `LineSensors`) and a sampler that stopped publishing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SenseError {
    #[error("no calibration for mode {0}")]
    NotCalibrated(ReadMode),
    #[error("sampler stalled for {ms} ms")]
    SamplerStalled { ms: u64 },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
