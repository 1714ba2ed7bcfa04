use std::path::PathBuf;

use auricle_host::HostError;
use thiserror::Error;

use crate::state::EngineState;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Raised by operations that need the engine to be idle.
    #[error("Program is {0}.")]
    AlreadyActive(EngineState),
    #[error("Program is exiting.")]
    Exiting,
    #[error("Program is not running.")]
    NotRunning,
    #[error("Stop request timed out.")]
    StopTimedOut,
    #[error("No processing library loaded.")]
    NoProcessingModule,
    #[error("No IO library loaded.")]
    NoDriver,
    #[error("The processing library does not return waveform data.")]
    OutputNotWaveform,
    #[error("The processing library returned invalid fragment size.")]
    InvalidFragsize,
    #[error("The processing library returned invalid sampling rate.")]
    InvalidSrate,
    #[error("The framework is not in a running state.")]
    NotProcessing,
    #[error(
        "The output block has {found_frames} frames of {found_channels} channels, \
         the processing library returned {frames} frames of {channels} channels."
    )]
    OutputBlockMismatch {
        frames: usize,
        channels: usize,
        found_frames: usize,
        found_channels: usize,
    },
    #[error("The variable \"{0}\" is locked.")]
    Locked(&'static str),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("failed to read engine configuration {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid engine configuration {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
