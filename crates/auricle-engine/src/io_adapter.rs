use std::sync::{Arc, Weak};

use auricle_host::{DriverLibrary, LibraryResolver, Result};
use auricle_sdk::{DriverContext, DriverResult, ErrorCode, StreamEvents, Waveform};

use crate::engine::Shared;

/// Receives driver events on the driver's thread and forwards them to the
/// engine. Holds the engine weakly so that a driver never keeps its own
/// engine alive.
pub(crate) struct EventBridge {
    engine: Weak<Shared>,
}

impl StreamEvents for EventBridge {
    fn process(&self, input: &mut Waveform, output: &mut Waveform) -> DriverResult {
        match self.engine.upgrade() {
            Some(engine) => engine.process_block(input, output),
            None => Err(ErrorCode::PROCESS_FAILED),
        }
    }

    fn started(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.on_started();
        }
    }

    fn stopped(&self, proc_error: i32, io_error: i32) {
        if let Some(engine) = self.engine.upgrade() {
            engine.on_stopped(proc_error, io_error);
        }
    }
}

/// The engine's audio driver.
#[derive(Debug)]
pub(crate) struct IoAdapter {
    driver: DriverLibrary,
}

impl IoAdapter {
    pub(crate) fn load(
        resolver: &LibraryResolver,
        name: &str,
        fragsize: u32,
        srate: f32,
        engine: Weak<Shared>,
    ) -> Result<Self> {
        let context = DriverContext {
            fragsize,
            srate,
            events: Arc::new(EventBridge { engine }),
        };
        let driver = DriverLibrary::load(resolver, name, context)?;
        tracing::info!(driver = driver.name(), fragsize, srate, "audio driver loaded");
        Ok(Self { driver })
    }

    pub(crate) fn name(&self) -> &str {
        self.driver.name()
    }

    pub(crate) fn prepare(&mut self, in_channels: u32, out_channels: u32) -> Result<()> {
        self.driver.prepare(in_channels, out_channels)
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        self.driver.start()
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.driver.stop()
    }

    pub(crate) fn release(&mut self) -> Result<()> {
        self.driver.release()
    }

    pub(crate) fn parse(&mut self, command: &str) -> Result<String> {
        self.driver.parse(command)
    }

    pub(crate) fn describe_error(&self, code: i32) -> String {
        self.driver.describe_error(code)
    }
}
