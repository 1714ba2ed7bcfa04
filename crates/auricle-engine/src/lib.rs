//! Lifecycle orchestration for the Auricle host.
//!
//! [`Engine`] drives one processing module and one audio driver through
//! prepare, start, stop, release and quit, and bridges the driver's
//! callbacks into its state machine. [`Framework`] exposes an engine through
//! named control variables.

pub mod control;
mod config;
mod engine;
mod error;
mod error_log;
mod framework;
mod io_adapter;
mod state;

pub use config::EngineConfig;
pub use control::{ControlError, ControlNode, ControlResult, ControlTree, Parsed, Value};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use error_log::ErrorLogs;
pub use framework::{Framework, DRIVER_SUBTREE, MODULE_SUBTREE};
pub use state::EngineState;
