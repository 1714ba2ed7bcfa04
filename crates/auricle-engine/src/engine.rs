use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use auricle_host::{LibraryResolver, ModuleLoader};
use auricle_sdk::{AcSpace, Domain, DriverResult, ErrorCode, Registry, SignalFormat, Waveform};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::error_log::ErrorLogs;
use crate::io_adapter::IoAdapter;
use crate::state::{EngineState, StateCell};

/// Lifecycle controller of one processing module and one audio driver.
///
/// Control operations are issued from a single control thread. The driver
/// reports stream events and delivers audio blocks from its own thread
/// through the bridge created when the driver is loaded. The handle is
/// cheap to clone; all clones control the same engine.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    state: StateCell,
    settings: Mutex<EngineConfig>,
    exit_on_stop: AtomicBool,
    exit_request: AtomicBool,
    nchannels_out: AtomicU32,
    proc_error: AtomicI32,
    io_error: AtomicI32,
    async_error: Mutex<String>,
    ac: AcSpace,
    module: Mutex<Option<ModuleLoader>>,
    io: Mutex<Option<IoAdapter>>,
    resolver: LibraryResolver,
}

impl Engine {
    /// Engine resolving libraries through `registry` and the default search
    /// path, with the directories of `config.library_path` searched first.
    pub fn new(config: EngineConfig, registry: Arc<Registry>) -> Self {
        let mut resolver = LibraryResolver::new(registry);
        resolver.prepend_search_dirs(config.library_path.iter().cloned());
        Self::with_resolver(config, resolver)
    }

    pub fn with_resolver(config: EngineConfig, resolver: LibraryResolver) -> Self {
        let shared = Shared {
            state: StateCell::new(EngineState::Unprepared),
            exit_on_stop: AtomicBool::new(config.exit_on_stop),
            settings: Mutex::new(config),
            exit_request: AtomicBool::new(false),
            nchannels_out: AtomicU32::new(0),
            proc_error: AtomicI32::new(0),
            io_error: AtomicI32::new(0),
            async_error: Mutex::new(String::new()),
            ac: AcSpace::new(),
            module: Mutex::new(None),
            io: Mutex::new(None),
            resolver,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.get()
    }

    pub fn ac(&self) -> &AcSpace {
        &self.shared.ac
    }

    pub fn resolver(&self) -> &LibraryResolver {
        &self.shared.resolver
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> EngineConfig {
        let mut config = self.shared.settings.lock().clone();
        config.exit_on_stop = self.shared.exit_on_stop.load(Ordering::Acquire);
        config
    }

    pub fn exit_requested(&self) -> bool {
        self.shared.exit_request.load(Ordering::Acquire)
    }

    /// Output channel count negotiated by the last successful prepare, zero
    /// while unprepared.
    pub fn nchannels_out(&self) -> u32 {
        self.shared.nchannels_out.load(Ordering::Acquire)
    }

    /// Codes passed to the last accepted `stopped` notification.
    pub fn latched_errors(&self) -> (i32, i32) {
        (
            self.shared.proc_error.load(Ordering::Acquire),
            self.shared.io_error.load(Ordering::Acquire),
        )
    }

    pub fn module_library(&self) -> Option<String> {
        self.shared
            .module
            .lock()
            .as_ref()
            .map(|module| module.library().to_owned())
    }

    pub fn module_has_parser(&self) -> bool {
        self.shared
            .module
            .lock()
            .as_ref()
            .is_some_and(|module| module.has_parser())
    }

    pub fn driver_name(&self) -> Option<String> {
        self.shared
            .io
            .lock()
            .as_ref()
            .map(|io| io.name().to_owned())
    }

    /// Names of the loaded processing module and driver libraries.
    pub fn loaded_libraries(&self) -> Vec<String> {
        self.module_library()
            .into_iter()
            .chain(self.driver_name())
            .collect()
    }

    /// Replaces the processing module. An empty specifier unloads it. The
    /// previous module is destroyed before the new one is created.
    pub fn load_module(&self, specifier: &str) -> Result<()> {
        self.require_unprepared()?;
        let mut slot = self.shared.module.lock();
        if let Some(previous) = slot.take() {
            tracing::info!(library = previous.library(), "processing module unloaded");
        }
        if specifier.trim().is_empty() {
            return Ok(());
        }
        let chain = self.shared.settings.lock().instance.clone();
        let loader =
            ModuleLoader::load_in_chain(&self.shared.resolver, &self.shared.ac, specifier, &chain)?;
        tracing::info!(
            library = loader.library(),
            instance = loader.instance(),
            "processing module loaded"
        );
        *slot = Some(loader);
        Ok(())
    }

    /// Replaces the audio driver. An empty name unloads it. The driver is
    /// created with the current block size and sample rate.
    pub fn load_driver(&self, name: &str) -> Result<()> {
        self.require_unprepared()?;
        let mut slot = self.shared.io.lock();
        if let Some(previous) = slot.take() {
            tracing::info!(driver = previous.name(), "audio driver unloaded");
        }
        if name.trim().is_empty() {
            return Ok(());
        }
        let (fragsize, srate) = {
            let settings = self.shared.settings.lock();
            (settings.fragsize, settings.srate)
        };
        let adapter = IoAdapter::load(
            &self.shared.resolver,
            name,
            fragsize,
            srate,
            Arc::downgrade(&self.shared),
        )?;
        *slot = Some(adapter);
        Ok(())
    }

    pub fn parse_module(&self, command: &str) -> Result<String> {
        let mut slot = self.shared.module.lock();
        let module = slot.as_mut().ok_or(EngineError::NoProcessingModule)?;
        Ok(module.parse(command)?)
    }

    pub fn parse_driver(&self, command: &str) -> Result<String> {
        let mut slot = self.shared.io.lock();
        let io = slot.as_mut().ok_or(EngineError::NoDriver)?;
        Ok(io.parse(command)?)
    }

    /// Fixed once a driver has been created with it.
    pub fn set_fragsize(&self, fragsize: u32) -> Result<()> {
        self.require_no_driver("fragsize")?;
        self.shared.settings.lock().fragsize = fragsize;
        Ok(())
    }

    pub fn set_srate(&self, srate: f32) -> Result<()> {
        self.require_no_driver("srate")?;
        self.shared.settings.lock().srate = srate;
        Ok(())
    }

    /// Only accepted while unprepared.
    pub fn set_input_channels(&self, channels: u32) -> Result<()> {
        if self.state() != EngineState::Unprepared {
            return Err(EngineError::Locked("nchannels_in"));
        }
        self.shared.settings.lock().nchannels_in = channels;
        Ok(())
    }

    pub fn set_instance(&self, instance: impl Into<String>) {
        self.shared.settings.lock().instance = instance.into();
    }

    pub fn set_exit_on_stop(&self, exit_on_stop: bool) {
        self.shared.exit_on_stop.store(exit_on_stop, Ordering::Release);
    }

    pub fn set_error_log(&self, path: Option<PathBuf>) {
        self.shared.settings.lock().errorlog = path;
    }

    pub fn set_fatal_log(&self, path: Option<PathBuf>) {
        self.shared.settings.lock().fatallog = path;
    }

    /// Negotiates the signal format with the processing module and prepares
    /// the driver. On failure the module is released again and the engine
    /// stays unprepared.
    pub fn prepare(&self) -> Result<()> {
        match self.state() {
            EngineState::Unprepared => {}
            EngineState::Stopped => return Ok(()),
            EngineState::Exiting => return Err(EngineError::Exiting),
            state => return Err(EngineError::AlreadyActive(state)),
        }
        let mut module_slot = self.shared.module.lock();
        let module = module_slot
            .as_mut()
            .ok_or(EngineError::NoProcessingModule)?;
        let mut io_slot = self.shared.io.lock();
        let io = io_slot.as_mut().ok_or(EngineError::NoDriver)?;

        let input = self.shared.settings.lock().input_format();
        let output = module.prepare(input)?;
        let driver_ready = check_output(&input, &output)
            .and_then(|()| Ok(io.prepare(input.channels, output.channels)?));
        if let Err(err) = driver_ready {
            if let Err(release_err) = module.release() {
                tracing::warn!(%release_err, "module release after failed prepare");
            }
            return Err(err);
        }

        self.shared
            .nchannels_out
            .store(output.channels, Ordering::Release);
        self.shared.ac.set_locked(true);
        self.shared
            .state
            .advance(EngineState::Unprepared, EngineState::Stopped);
        tracing::info!(
            nchannels_in = input.channels,
            nchannels_out = output.channels,
            fragsize = input.fragsize,
            srate = input.srate,
            "engine prepared"
        );
        Ok(())
    }

    /// Asks the driver to start streaming. The engine reaches `Running` when
    /// the driver reports the stream as started.
    pub fn start(&self) -> Result<()> {
        match self.state() {
            EngineState::Unprepared => {
                self.prepare()?;
                self.start()
            }
            EngineState::Stopped => {
                if !self
                    .shared
                    .state
                    .advance(EngineState::Stopped, EngineState::Starting)
                {
                    return self.start();
                }
                tracing::info!("engine starting");
                let started = self.with_driver(|io| io.start());
                if started.is_err() {
                    self.shared
                        .state
                        .advance(EngineState::Starting, EngineState::Stopped);
                }
                started
            }
            EngineState::Starting | EngineState::Running | EngineState::Stopping => Ok(()),
            EngineState::Exiting => Err(EngineError::Exiting),
        }
    }

    /// Asks the driver to stop and waits for its `stopped` notification.
    pub fn stop(&self) -> Result<()> {
        match self.state() {
            EngineState::Unprepared => Err(EngineError::NotRunning),
            EngineState::Stopped | EngineState::Stopping => Ok(()),
            EngineState::Exiting => Err(EngineError::Exiting),
            EngineState::Starting | EngineState::Running => {
                let requested = self.shared.state.transition(|state| {
                    matches!(state, EngineState::Starting | EngineState::Running)
                        .then_some(EngineState::Stopping)
                });
                if requested.is_err() {
                    return self.stop();
                }
                tracing::info!("engine stopping");
                self.with_driver(|io| io.stop())?;
                self.wait_for_stopped()
            }
        }
    }

    /// Releases driver and module and returns to `Unprepared`. A running
    /// stream is stopped first.
    pub fn release(&self) -> Result<()> {
        match self.state() {
            EngineState::Unprepared => Ok(()),
            EngineState::Exiting => Err(EngineError::Exiting),
            EngineState::Starting | EngineState::Running => {
                self.stop()?;
                self.release()
            }
            EngineState::Stopped | EngineState::Stopping => {
                self.shared.ac.set_locked(false);
                let driver_released = match self.shared.io.lock().as_mut() {
                    Some(io) => io.release().map_err(EngineError::from),
                    None => Ok(()),
                };
                let module_released = match self.shared.module.lock().as_mut() {
                    Some(module) => module.release().map_err(EngineError::from),
                    None => Ok(()),
                };
                self.shared.state.transition(|state| {
                    matches!(state, EngineState::Stopped | EngineState::Stopping)
                        .then_some(EngineState::Unprepared)
                }).ok();
                self.shared.nchannels_out.store(0, Ordering::Release);
                tracing::info!("engine released");
                driver_released.and(module_released)
            }
        }
    }

    /// Releases everything it can, then enters `Exiting` and raises the exit
    /// request. A release failure is returned after the engine has exited.
    pub fn quit(&self) -> Result<()> {
        if self.state() == EngineState::Exiting {
            return Ok(());
        }
        let released = self.release();
        if let Err(err) = &released {
            tracing::warn!(%err, "release during quit failed");
        }
        let previous = self.shared.state.enter_exiting();
        self.shared.exit_request.store(true, Ordering::Release);
        tracing::info!(%previous, "engine exiting");
        released
    }

    /// Returns the latched processing error text and the description of a
    /// latched driver error, and clears both.
    pub fn take_async_error(&self) -> String {
        let mut text = mem::take(&mut *self.shared.async_error.lock());
        let io_error = self.shared.io_error.load(Ordering::Acquire);
        if io_error != 0 {
            if let Some(io) = self.shared.io.lock().as_ref() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str("IO Error: ");
                text.push_str(&io.describe_error(io_error));
                self.shared.io_error.store(0, Ordering::Release);
            }
        }
        text
    }

    /// Driver entry point for one audio block, also usable directly.
    pub fn process(&self, input: &mut Waveform, output: &mut Waveform) -> DriverResult {
        self.shared.process_block(input, output)
    }

    pub fn on_started(&self) {
        self.shared.on_started();
    }

    pub fn on_stopped(&self, proc_error: i32, io_error: i32) {
        self.shared.on_stopped(proc_error, io_error);
    }

    fn require_unprepared(&self) -> Result<()> {
        match self.state() {
            EngineState::Unprepared => Ok(()),
            EngineState::Exiting => Err(EngineError::Exiting),
            state => Err(EngineError::AlreadyActive(state)),
        }
    }

    fn require_no_driver(&self, name: &'static str) -> Result<()> {
        if self.shared.io.lock().is_some() {
            return Err(EngineError::Locked(name));
        }
        Ok(())
    }

    fn with_driver(
        &self,
        call: impl FnOnce(&mut IoAdapter) -> auricle_host::Result<()>,
    ) -> Result<()> {
        let mut slot = self.shared.io.lock();
        let io = slot.as_mut().ok_or(EngineError::NoDriver)?;
        Ok(call(io)?)
    }

    fn wait_for_stopped(&self) -> Result<()> {
        let (interval, limit) = {
            let settings = self.shared.settings.lock();
            (settings.stop_poll_interval(), settings.stop_poll_limit)
        };
        for _ in 0..limit {
            if self.state() == EngineState::Stopped {
                return Ok(());
            }
            thread::sleep(interval);
        }
        if self.state() == EngineState::Stopped {
            return Ok(());
        }
        tracing::error!(polls = limit, ?interval, "driver did not acknowledge stop");
        Err(EngineError::StopTimedOut)
    }
}

impl Shared {
    pub(crate) fn on_started(&self) {
        let accepted = self.state.transition(|state| {
            matches!(
                state,
                EngineState::Stopped | EngineState::Starting | EngineState::Running
            )
            .then_some(EngineState::Running)
        });
        match accepted {
            Ok(previous) => tracing::debug!(%previous, "stream started"),
            Err(state) => tracing::debug!(%state, "ignoring stale start notification"),
        }
    }

    pub(crate) fn on_stopped(&self, proc_error: i32, io_error: i32) {
        let accepted = self.state.transition(|state| {
            matches!(
                state,
                EngineState::Stopped
                    | EngineState::Starting
                    | EngineState::Running
                    | EngineState::Stopping
            )
            .then_some(EngineState::Stopped)
        });
        match accepted {
            Ok(previous) => {
                self.proc_error.store(proc_error, Ordering::Release);
                self.io_error.store(io_error, Ordering::Release);
                if self.exit_on_stop.load(Ordering::Acquire) {
                    self.exit_request.store(true, Ordering::Release);
                }
                tracing::debug!(%previous, proc_error, io_error, "stream stopped");
            }
            Err(state) => tracing::debug!(%state, "ignoring stale stop notification"),
        }
    }

    pub(crate) fn process_block(
        &self,
        input: &mut Waveform,
        output: &mut Waveform,
    ) -> DriverResult {
        match self.run_block(input, output) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.report_processing_error(&err.to_string());
                Err(ErrorCode::PROCESS_FAILED)
            }
        }
    }

    fn run_block(&self, input: &mut Waveform, output: &mut Waveform) -> Result<()> {
        if !matches!(
            self.state.get(),
            EngineState::Running | EngineState::Stopping
        ) {
            return Err(EngineError::NotProcessing);
        }
        let mut slot = self.module.lock();
        let module = slot.as_mut().ok_or(EngineError::NoProcessingModule)?;
        let processed = module.process_wave(input)?;
        if (output.frames(), output.channels()) != (processed.frames(), processed.channels()) {
            return Err(EngineError::OutputBlockMismatch {
                frames: processed.frames(),
                channels: processed.channels(),
                found_frames: output.frames(),
                found_channels: output.channels(),
            });
        }
        output.copy_channels_from(processed);
        Ok(())
    }

    fn report_processing_error(&self, message: &str) {
        *self.async_error.lock() = message.to_owned();
        tracing::error!(error = message, "block processing failed");
        let logs = {
            let settings = self.settings.lock();
            ErrorLogs::new(settings.errorlog.clone(), settings.fatallog.clone())
        };
        match logs.record(message) {
            Ok(Some(path)) => tracing::debug!(path = %path.display(), "error log written"),
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, "failed to write error log"),
        }
    }
}

fn check_output(input: &SignalFormat, output: &SignalFormat) -> Result<()> {
    if output.domain != Domain::Waveform {
        return Err(EngineError::OutputNotWaveform);
    }
    if output.fragsize != input.fragsize {
        return Err(EngineError::InvalidFragsize);
    }
    if output.srate != input.srate {
        return Err(EngineError::InvalidSrate);
    }
    Ok(())
}
