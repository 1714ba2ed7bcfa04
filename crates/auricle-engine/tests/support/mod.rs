#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use auricle_engine::{Engine, EngineConfig};
use auricle_host::LibraryResolver;
use auricle_sdk::{
    Configurable, Domain, Driver, DriverContext, DriverResult, ErrorCode, FnDriverFactory,
    FnModuleFactory, Module, ModuleDescriptor, ModuleError, ModuleResult, Registry, SignalFormat,
    Spectrum, StreamEvents, WaveToSpec, WaveToWave, Waveform,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Prepare { inputs: u32, outputs: u32 },
    Start,
    Stop,
    Release,
    Parse(String),
}

/// Driver that records every call and only raises stream events when the
/// test asks it to, except for `stop` when `ack_stop` is set.
pub struct MockDriver {
    commands: Arc<Mutex<Vec<DriverCommand>>>,
    events: Arc<dyn StreamEvents>,
    ack_stop: bool,
}

impl Driver for MockDriver {
    fn prepare(&mut self, in_channels: u32, out_channels: u32) -> DriverResult {
        self.commands.lock().push(DriverCommand::Prepare {
            inputs: in_channels,
            outputs: out_channels,
        });
        Ok(())
    }

    fn start(&mut self) -> DriverResult {
        self.commands.lock().push(DriverCommand::Start);
        Ok(())
    }

    fn stop(&mut self) -> DriverResult {
        self.commands.lock().push(DriverCommand::Stop);
        if self.ack_stop {
            self.events.stopped(0, 0);
        }
        Ok(())
    }

    fn release(&mut self) -> DriverResult {
        self.commands.lock().push(DriverCommand::Release);
        Ok(())
    }

    fn parse(&mut self, command: &str) -> DriverResult<String> {
        self.commands
            .lock()
            .push(DriverCommand::Parse(command.to_owned()));
        match command {
            "fail=1" => Err(ErrorCode::new(3).unwrap_or(ErrorCode::PROCESS_FAILED)),
            _ => Ok(format!("mock:{command}")),
        }
    }

    fn describe_error(&self, code: ErrorCode) -> String {
        format!("mock failure {}", code.get())
    }
}

/// Module log entries, prefixed with the instance name.
pub type ModuleLog = Arc<Mutex<Vec<String>>>;

/// Waveform pass-through scaling its input by `factor`.
pub struct Scale {
    instance: String,
    log: ModuleLog,
    factor: f32,
    fail_with: Option<&'static str>,
}

impl WaveToWave for Scale {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform> {
        self.log.lock().push(format!("{}:process", self.instance));
        if let Some(message) = self.fail_with {
            return Err(ModuleError::msg(message));
        }
        for sample in input.as_mut_slice() {
            *sample *= self.factor;
        }
        Ok(input)
    }
}

impl Configurable for Scale {
    fn parse(&mut self, command: &str) -> ModuleResult<String> {
        if command == "factor?" {
            return Ok(self.factor.to_string());
        }
        let value = command
            .strip_prefix("factor=")
            .ok_or_else(|| ModuleError::UnknownParameter(command.to_owned()))?;
        self.factor = value.trim().parse().map_err(|_| ModuleError::InvalidValue {
            name: "factor".into(),
            value: value.into(),
            reason: "not a number".into(),
        })?;
        Ok(String::new())
    }
}

impl Module for Scale {
    fn prepare(&mut self, format: &mut SignalFormat) -> ModuleResult<()> {
        self.log
            .lock()
            .push(format!("{}:prepare:{}", self.instance, format.channels));
        Ok(())
    }

    fn release(&mut self) -> ModuleResult<()> {
        self.log.lock().push(format!("{}:release", self.instance));
        Ok(())
    }

    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }

    fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
        Some(self)
    }
}

/// Declares spectral output, which the engine cannot hand to a driver.
pub struct Analyzer {
    log: ModuleLog,
    output: Spectrum,
}

impl WaveToSpec for Analyzer {
    fn process<'a>(&'a mut self, _input: &'a mut Waveform) -> ModuleResult<&'a mut Spectrum> {
        Ok(&mut self.output)
    }
}

impl Module for Analyzer {
    fn prepare(&mut self, format: &mut SignalFormat) -> ModuleResult<()> {
        self.log.lock().push("analyzer:prepare".into());
        format.domain = Domain::Spectrum;
        format.fftlen = 2 * format.fragsize;
        format.wndlen = format.fragsize;
        Ok(())
    }

    fn release(&mut self) -> ModuleResult<()> {
        self.log.lock().push("analyzer:release".into());
        Ok(())
    }

    fn wave_to_spec(&mut self) -> Option<&mut dyn WaveToSpec> {
        Some(self)
    }
}

pub struct Harness {
    pub engine: Engine,
    pub driver: Arc<Mutex<Vec<DriverCommand>>>,
    pub modules: ModuleLog,
    pub events: Arc<Mutex<Option<Arc<dyn StreamEvents>>>>,
}

impl Harness {
    pub fn new(ack_stop: bool) -> Self {
        Self::with_config(ack_stop, fast_stop(EngineConfig::default()))
    }

    pub fn with_config(ack_stop: bool, config: EngineConfig) -> Self {
        let driver = Arc::new(Mutex::new(Vec::new()));
        let modules = ModuleLog::default();
        let events = Arc::new(Mutex::new(None));
        let registry = registry(ack_stop, &driver, &modules, &events);
        let resolver = LibraryResolver::new(Arc::new(registry)).with_search_path(Vec::new());
        Self {
            engine: Engine::with_resolver(config, resolver),
            driver,
            modules,
            events,
        }
    }

    /// Loads the `scale` module and the mock driver.
    pub fn loaded(ack_stop: bool) -> Self {
        let harness = Self::new(ack_stop);
        harness.engine.load_module("scale").expect("load module");
        harness.engine.load_driver("mock").expect("load driver");
        harness
    }

    pub fn events(&self) -> Arc<dyn StreamEvents> {
        self.events
            .lock()
            .clone()
            .expect("driver has been created")
    }

    pub fn driver_commands(&self) -> Vec<DriverCommand> {
        self.driver.lock().clone()
    }

    pub fn module_log(&self) -> Vec<String> {
        self.modules.lock().clone()
    }
}

pub fn fast_stop(config: EngineConfig) -> EngineConfig {
    config.with_stop_poll(Duration::from_millis(1), 20)
}

fn registry(
    ack_stop: bool,
    commands: &Arc<Mutex<Vec<DriverCommand>>>,
    modules: &ModuleLog,
    events: &Arc<Mutex<Option<Arc<dyn StreamEvents>>>>,
) -> Registry {
    let mut registry = Registry::new();

    let commands = Arc::clone(commands);
    let slot = Arc::clone(events);
    registry.register_driver(Box::new(FnDriverFactory::new(
        ModuleDescriptor::new("mock"),
        move |context: DriverContext| {
            *slot.lock() = Some(Arc::clone(&context.events));
            Ok(Box::new(MockDriver {
                commands: Arc::clone(&commands),
                events: context.events,
                ack_stop,
            }) as Box<dyn Driver>)
        },
    )));

    for (name, fail_with) in [
        ("scale", None),
        ("broken", Some("division by zero")),
        ("doomed", Some("Fatal error: filter unstable")),
    ] {
        let log = Arc::clone(modules);
        registry.register_module(Box::new(FnModuleFactory::new(
            ModuleDescriptor::new(name),
            move |context: &auricle_sdk::ModuleContext| {
                Ok(Box::new(Scale {
                    instance: context.instance.clone(),
                    log: Arc::clone(&log),
                    factor: 1.0,
                    fail_with,
                }) as Box<dyn Module>)
            },
        )));
    }

    let log = Arc::clone(modules);
    registry.register_module(Box::new(FnModuleFactory::new(
        ModuleDescriptor::new("analyzer"),
        move |_: &auricle_sdk::ModuleContext| {
            Ok(Box::new(Analyzer {
                log: Arc::clone(&log),
                output: Spectrum::new(1, 1),
            }) as Box<dyn Module>)
        },
    )));
    registry
}
