use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::control::{ControlError, ControlNode, ControlResult, ControlTree, Parsed, Value};
use crate::engine::Engine;
use crate::error::Result;
use crate::state::EngineState;

const COMMANDS: [&str; 6] = ["nop", "prepare", "start", "stop", "release", "quit"];

/// Subtree name of the processing module's parameters.
pub const MODULE_SUBTREE: &str = "mha";
/// Subtree name of the driver's parameters.
pub const DRIVER_SUBTREE: &str = "io";

/// An [`Engine`] exposed through its control variables.
///
/// Writing a variable triggers the engine operation bound to it. After
/// every command the write locks are brought in line with the engine:
/// `nchannels_in` is locked while prepared, `fragsize` and `srate` while a
/// driver exists, and the library names from a successful load until the
/// next `cmd=release`.
pub struct Framework {
    engine: Engine,
    tree: ControlTree,
}

impl Framework {
    pub fn new(engine: Engine) -> ControlResult<Self> {
        let config = engine.config();
        let mut tree = ControlTree::new();
        tree.insert_setting(
            "nchannels_in",
            "Number of input channels",
            Value::int(config.nchannels_in.into(), 1),
        )?;
        tree.insert_setting(
            "fragsize",
            "Fragment size in samples, fixed once a driver is loaded",
            Value::int(config.fragsize.into(), 1),
        )?;
        tree.insert_setting(
            "srate",
            "Sampling rate in Hz, fixed once a driver is loaded",
            Value::float(config.srate.into(), 1.0),
        )?;
        let monitor = engine.clone();
        tree.insert_monitor(
            "nchannels_out",
            "Number of output channels negotiated by the last prepare",
            move || monitor.nchannels_out().to_string(),
        )?;
        tree.insert_setting(
            "mhalib",
            "Processing module, library[:instance][<config-file]",
            Value::text(""),
        )?;
        tree.insert_setting("iolib", "Audio driver library", Value::text(""))?;
        tree.insert_setting(
            "sleep",
            "Blocks the control thread for the given number of seconds",
            Value::float(0.0, 0.0),
        )?;
        tree.insert_setting("cmd", "Engine command", Value::keyword(COMMANDS))?;
        let monitor = engine.clone();
        tree.insert_monitor(
            "asyncerror",
            "Last asynchronous processing error, cleared on read",
            move || monitor.take_async_error(),
        )?;
        let monitor = engine.clone();
        tree.insert_monitor("state", "Engine state", move || {
            monitor.state().as_str().to_owned()
        })?;
        tree.insert_setting(
            "errorlog",
            "File receiving processing errors",
            Value::text(path_text(&config.errorlog)),
        )?;
        tree.insert_setting(
            "fatallog",
            "File receiving fatal processing errors",
            Value::text(path_text(&config.fatallog)),
        )?;
        tree.insert_setting(
            "exit_on_stop",
            "Request exit when the driver stops the stream",
            Value::Bool(config.exit_on_stop),
        )?;
        let monitor = engine.clone();
        tree.insert_monitor("plugins", "Loaded libraries", move || {
            format!("[{}]", monitor.loaded_libraries().join(" "))
        })?;
        tree.insert_setting(
            "instance",
            "Chain name passed to the processing module",
            Value::text(config.instance),
        )?;
        Ok(Self { engine, tree })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn tree(&self) -> &ControlTree {
        &self.tree
    }

    pub fn exit_requested(&self) -> bool {
        self.engine.exit_requested()
    }

    /// Executes one control command and returns its reply.
    pub fn parse(&mut self, command: &str) -> ControlResult<String> {
        let result = self.dispatch(command);
        self.sync_locks();
        result
    }

    fn dispatch(&mut self, command: &str) -> ControlResult<String> {
        match self.tree.parse(command)? {
            Parsed::Reply(text) => Ok(text),
            Parsed::Include(file) => self.include(&file),
            Parsed::Written { name, previous } => {
                let applied = self.apply(&name);
                if name == "cmd" {
                    self.tree.restore(&name, Value::keyword(COMMANDS));
                } else if applied.is_err() {
                    let restored = match name.as_str() {
                        "mhalib" if self.engine.module_library().is_none() => Value::text(""),
                        "iolib" if self.engine.driver_name().is_none() => Value::text(""),
                        _ => previous,
                    };
                    self.tree.restore(&name, restored);
                }
                applied
                    .map(|()| String::new())
                    .map_err(|err| ControlError::Action(err.to_string()))
            }
        }
    }

    fn include(&mut self, file: &str) -> ControlResult<String> {
        let text = fs::read_to_string(file)
            .map_err(|err| ControlError::Action(format!("Unable to read file \"{file}\": {err}")))?;
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.parse(line)?;
        }
        Ok(String::new())
    }

    fn apply(&mut self, name: &str) -> Result<()> {
        let Some(value) = self.tree.value(name).cloned() else {
            return Ok(());
        };
        match name {
            "nchannels_in" => self.engine.set_input_channels(int_value(&value)),
            "fragsize" => self.engine.set_fragsize(int_value(&value)),
            "srate" => self.engine.set_srate(value.as_float().unwrap_or_default() as f32),
            "mhalib" => self.load_module(value.as_text().unwrap_or_default()),
            "iolib" => self.load_driver(value.as_text().unwrap_or_default()),
            "sleep" => {
                let seconds = value.as_float().unwrap_or_default();
                if let Ok(duration) = Duration::try_from_secs_f64(seconds) {
                    thread::sleep(duration);
                }
                Ok(())
            }
            "cmd" => self.run(value.as_text().unwrap_or("nop")),
            "errorlog" => {
                self.engine.set_error_log(path_value(&value));
                Ok(())
            }
            "fatallog" => {
                self.engine.set_fatal_log(path_value(&value));
                Ok(())
            }
            "exit_on_stop" => {
                self.engine
                    .set_exit_on_stop(value.as_bool().unwrap_or_default());
                Ok(())
            }
            "instance" => {
                self.engine
                    .set_instance(value.as_text().unwrap_or_default());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn run(&mut self, command: &str) -> Result<()> {
        tracing::debug!(command, "engine command");
        match command {
            "prepare" => self.engine.prepare(),
            "start" => self.engine.start(),
            "stop" => self.engine.stop(),
            "release" => {
                self.engine.release()?;
                self.lock_library_names(false);
                Ok(())
            }
            "quit" => self.engine.quit(),
            _ => Ok(()),
        }
    }

    /// The `mha` subtree follows the loaded module, whether or not the
    /// load succeeded.
    fn load_module(&mut self, specifier: &str) -> Result<()> {
        let loaded = self.engine.load_module(specifier);
        self.tree.remove(MODULE_SUBTREE);
        if self.engine.module_library().is_some() {
            if self.engine.module_has_parser() {
                let node = ModuleNode {
                    engine: self.engine.clone(),
                };
                self.tree.insert_subtree(MODULE_SUBTREE, Box::new(node)).ok();
            }
            if loaded.is_ok() {
                self.tree.set_locked("mhalib", true).ok();
            }
        }
        loaded
    }

    fn load_driver(&mut self, name: &str) -> Result<()> {
        let loaded = self.engine.load_driver(name);
        self.tree.remove(DRIVER_SUBTREE);
        if self.engine.driver_name().is_some() {
            let node = DriverNode {
                engine: self.engine.clone(),
            };
            self.tree.insert_subtree(DRIVER_SUBTREE, Box::new(node)).ok();
            if loaded.is_ok() {
                self.tree.set_locked("iolib", true).ok();
            }
        }
        loaded
    }

    fn lock_library_names(&mut self, locked: bool) {
        self.tree.set_locked("mhalib", locked).ok();
        self.tree.set_locked("iolib", locked).ok();
    }

    fn sync_locks(&mut self) {
        let prepared = self.engine.state() != EngineState::Unprepared;
        let has_driver = self.engine.driver_name().is_some();
        self.tree.set_locked("nchannels_in", prepared).ok();
        self.tree.set_locked("fragsize", has_driver).ok();
        self.tree.set_locked("srate", has_driver).ok();
    }
}

impl std::fmt::Debug for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("state", &self.engine.state())
            .field("tree", &self.tree)
            .finish()
    }
}

struct ModuleNode {
    engine: Engine,
}

impl ControlNode for ModuleNode {
    fn parse(&mut self, command: &str) -> ControlResult<String> {
        self.engine
            .parse_module(command)
            .map_err(|err| ControlError::Subtree(err.to_string()))
    }
}

struct DriverNode {
    engine: Engine,
}

impl ControlNode for DriverNode {
    fn parse(&mut self, command: &str) -> ControlResult<String> {
        self.engine
            .parse_driver(command)
            .map_err(|err| ControlError::Subtree(err.to_string()))
    }
}

fn int_value(value: &Value) -> u32 {
    value
        .as_int()
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or_default()
}

fn path_value(value: &Value) -> Option<PathBuf> {
    value
        .as_text()
        .filter(|text| !text.is_empty())
        .map(PathBuf::from)
}

fn path_text(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
}
