use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

const FATAL_MARKER: &str = "Fatal error";

/// The two persistent error logs written when block processing fails.
///
/// Messages containing `Fatal error` replace the contents of the fatal log,
/// all other messages are appended to the error log. A missing path
/// disables the corresponding log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLogs {
    pub errorlog: Option<PathBuf>,
    pub fatallog: Option<PathBuf>,
}

impl ErrorLogs {
    pub fn new(errorlog: Option<PathBuf>, fatallog: Option<PathBuf>) -> Self {
        Self { errorlog, fatallog }
    }

    pub fn is_fatal(message: &str) -> bool {
        message.contains(FATAL_MARKER)
    }

    /// Writes `<timestamp>: <message>.` to the log selected by `message`.
    /// Returns the path written, if any.
    pub fn record(&self, message: &str) -> io::Result<Option<&Path>> {
        let line = format!("{}: {}.\n", Local::now().format("%c"), message);
        if Self::is_fatal(message) {
            let Some(path) = self.fatallog.as_deref() else {
                return Ok(None);
            };
            fs::write(path, line)?;
            Ok(Some(path))
        } else {
            let Some(path) = self.errorlog.as_deref() else {
                return Ok(None);
            };
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?
                .write_all(line.as_bytes())?;
            Ok(Some(path))
        }
    }
}
