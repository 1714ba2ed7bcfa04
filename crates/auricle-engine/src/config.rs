use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use auricle_sdk::SignalFormat;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Start-up settings of an engine. Every field can later be changed through
/// the control variables of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fragsize: u32,
    pub srate: f32,
    pub nchannels_in: u32,
    /// Chain name handed to the processing module.
    pub instance: String,
    pub exit_on_stop: bool,
    pub errorlog: Option<PathBuf>,
    pub fatallog: Option<PathBuf>,
    pub stop_poll_interval_ms: u64,
    pub stop_poll_limit: u32,
    /// Searched before `AURICLE_LIBRARY_PATH` and the user module directory.
    pub library_path: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fragsize: 200,
            srate: 44_100.0,
            nchannels_in: 1,
            instance: String::from("mha"),
            exit_on_stop: false,
            errorlog: None,
            fatallog: None,
            stop_poll_interval_ms: 1,
            stop_poll_limit: 2000,
            library_path: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_fragsize(mut self, fragsize: u32) -> Self {
        self.fragsize = fragsize;
        self
    }

    pub fn with_srate(mut self, srate: f32) -> Self {
        self.srate = srate;
        self
    }

    pub fn with_input_channels(mut self, channels: u32) -> Self {
        self.nchannels_in = channels;
        self
    }

    pub fn with_instance<S: Into<String>>(mut self, instance: S) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_exit_on_stop(mut self, exit_on_stop: bool) -> Self {
        self.exit_on_stop = exit_on_stop;
        self
    }

    pub fn with_error_logs(mut self, errorlog: Option<PathBuf>, fatallog: Option<PathBuf>) -> Self {
        self.errorlog = errorlog;
        self.fatallog = fatallog;
        self
    }

    pub fn with_stop_poll(mut self, interval: Duration, limit: u32) -> Self {
        self.stop_poll_interval_ms = interval.as_millis() as u64;
        self.stop_poll_limit = limit;
        self
    }

    pub fn with_library_path(mut self, library_path: Vec<PathBuf>) -> Self {
        self.library_path = library_path;
        self
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    /// Format offered to the processing module on prepare.
    pub fn input_format(&self) -> SignalFormat {
        SignalFormat::waveform(self.nchannels_in, self.fragsize, self.srate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "fragsize": 64, "errorlog": "errors.log" }"#).expect("write");

        let config = EngineConfig::from_file(&path).expect("parse");
        assert_eq!(config.fragsize, 64);
        assert_eq!(config.srate, 44_100.0);
        assert_eq!(config.instance, "mha");
        assert_eq!(config.errorlog, Some(PathBuf::from("errors.log")));
        assert_eq!(config.stop_poll_interval(), Duration::from_millis(1));
        assert_eq!(config.stop_poll_limit, 2000);
    }

    #[test]
    fn malformed_files_name_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ fragsize: ").expect("write");
        let err = EngineConfig::from_file(&path).expect_err("malformed");
        assert!(err.to_string().contains("broken.json"));
    }
}
