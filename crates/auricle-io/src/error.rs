use std::path::PathBuf;

use auricle_sdk::ErrorCode;
use parking_lot::Mutex;
use thiserror::Error;

/// Code returned for every failure described by [`DriverError`].
pub const USER_ERROR: ErrorCode = match ErrorCode::new(-1000) {
    Some(code) => code,
    None => unreachable!(),
};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Invalid variable name \"{0}\".")]
    UnknownParameter(String),
    #[error("Invalid value \"{value}\" for \"{name}\": {reason}.")]
    InvalidValue {
        name: String,
        value: String,
        reason: &'static str,
    },
    #[error("The variable \"{0}\" is locked.")]
    Locked(String),
    #[error("Invalid query \"{0}\".")]
    InvalidQuery(String),
    #[error("The {0} client was not prepared for start.")]
    NotPrepared(&'static str),
    #[error("The {0} client is already running.")]
    AlreadyRunning(&'static str),
    #[error("Input filename not provided.")]
    MissingInput,
    #[error("Output filename not provided.")]
    MissingOutput,
    #[error("Unable to open \"{}\" for reading: {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("Unable to open \"{}\" for writing: {source}", .path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("The input file has {found} channels, but {required} are required.")]
    ChannelMismatch { found: u16, required: u32 },
    #[error("The input file has {found} Hz samplerate, but {required} Hz is required.")]
    SrateMismatch { found: u32, required: f32 },
    #[error("Invalid block duration: {fragsize} samples at {srate} Hz.")]
    InvalidClock { fragsize: u32, srate: f32 },
    #[error(transparent)]
    Wav(#[from] hound::Error),
    #[error("failed to spawn the stream thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("the stream thread panicked")]
    WorkerPanicked,
}

/// Holds the text of the last failure so that it can be described after
/// only its code crossed the driver boundary.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    last: Mutex<String>,
}

impl ErrorSlot {
    pub(crate) fn fail(&self, err: DriverError) -> ErrorCode {
        tracing::debug!(%err, "driver call failed");
        *self.last.lock() = err.to_string();
        USER_ERROR
    }

    pub(crate) fn check<T>(&self, result: Result<T, DriverError>) -> Result<T, ErrorCode> {
        result.map_err(|err| self.fail(err))
    }

    pub(crate) fn describe(&self, code: ErrorCode) -> String {
        if code == USER_ERROR {
            self.last.lock().clone()
        } else {
            format!("Unknown error {code}.")
        }
    }
}
