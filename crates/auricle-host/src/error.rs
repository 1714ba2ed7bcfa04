use std::path::{Path, PathBuf};

use auricle_sdk::{Domain, FormatMismatch, ModuleError, VersionMismatch};
use thiserror::Error;

/// Errors raised while loading, negotiating with, or running a module or
/// driver library.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Empty plugin configuration name.")]
    EmptyLibraryName,
    #[error("library \"{name}\" is neither registered nor found on the search path [{}]", display_paths(.searched))]
    LibraryNotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to load library {}: {source}", .path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("library {library} does not export `{symbol}`")]
    MissingEntry { library: String, symbol: String },
    #[error("{library}: {reason}")]
    IncompatibleVersion {
        library: String,
        reason: VersionMismatch,
    },
    #[error("Error in module \"{library}:{instance}\":\n{message}")]
    Module {
        library: String,
        instance: String,
        message: String,
    },
    #[error("The plugin {library} provides no processing callback.")]
    NoProcessCallbacks { library: String },
    #[error("The plugin {library} has no processing callback for {input} to {output} processing.{}", release_note(.release_error))]
    NoMatchingProcessCallback {
        library: String,
        input: Domain,
        output: Domain,
        release_error: Option<String>,
    },
    #[error("Processing callback undefined.")]
    ProcessingCallbackUndefined,
    #[error("The plugin {0} is already prepared.")]
    AlreadyPrepared(String),
    #[error("{prefix}: {}", join_mismatches(.mismatches))]
    FormatMismatch {
        prefix: String,
        mismatches: Vec<FormatMismatch>,
    },
    #[error("The plugin {0} has no configuration interface.")]
    NoConfigInterface(String),
    #[error("IO error: {0}")]
    Driver(String),
    #[error("failed to read configuration file {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = HostError> = std::result::Result<T, E>;

impl HostError {
    pub(crate) fn module(library: &str, instance: &str, err: ModuleError) -> Self {
        HostError::Module {
            library: library.to_owned(),
            instance: instance.to_owned(),
            message: err.to_string(),
        }
    }

    pub(crate) fn config_file(path: &Path, source: std::io::Error) -> Self {
        HostError::ConfigFile {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_mismatches(mismatches: &[FormatMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn release_note(release_error: &Option<String>) -> String {
    match release_error {
        Some(message) => format!("\n(Release failed with message: \n\"{message}\""),
        None => String::new(),
    }
}
