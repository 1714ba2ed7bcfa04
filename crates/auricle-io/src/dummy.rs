use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use auricle_sdk::{Driver, DriverContext, DriverResult, ErrorCode, StreamEvents, Waveform};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};

use crate::error::{DriverError, ErrorSlot};
use crate::params::Params;

pub const NAME: &str = "dummy";

/// Simulated real-time stream. Input blocks are silent and output blocks are
/// discarded; one block is delivered every `fragsize / srate` seconds.
pub struct DummyDriver {
    fragsize: u32,
    interval: Duration,
    events: Arc<dyn StreamEvents>,
    channels: Option<(u32, u32)>,
    worker: Option<Worker>,
    params: Params,
    errors: ErrorSlot,
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<bool>,
    /// Set by the stream thread before it reports a failed block.
    ended: Arc<AtomicBool>,
}

impl Worker {
    fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

impl DummyDriver {
    pub fn new(context: DriverContext) -> Result<Self, DriverError> {
        let seconds = f64::from(context.fragsize) / f64::from(context.srate);
        if context.fragsize == 0 || !seconds.is_finite() || seconds <= 0.0 {
            return Err(DriverError::InvalidClock {
                fragsize: context.fragsize,
                srate: context.srate,
            });
        }
        Ok(Self {
            fragsize: context.fragsize,
            interval: Duration::from_secs_f64(seconds),
            events: context.events,
            channels: None,
            worker: None,
            params: Params::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.has_ended())
    }

    fn spawn(&mut self) -> Result<(), DriverError> {
        // A stream that ended on a processing error is joined here, since
        // the engine does not call `stop` once it has been told.
        if self.worker.as_ref().is_some_and(Worker::has_ended) {
            self.join()?;
        }
        if self.worker.is_some() {
            return Err(DriverError::AlreadyRunning(NAME));
        }
        let (inputs, outputs) = self.channels.ok_or(DriverError::NotPrepared(NAME))?;
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let events = Arc::clone(&self.events);
        let interval = self.interval;
        let frames = self.fragsize as usize;
        let ended = Arc::new(AtomicBool::new(false));
        let ended_flag = Arc::clone(&ended);
        let handle = thread::Builder::new()
            .name("auricle-dummy-io".to_string())
            .spawn(move || {
                let mut input = Waveform::new(frames, inputs as usize);
                let mut output = Waveform::new(frames, outputs as usize);
                loop {
                    events.started();
                    let tic = Instant::now();
                    input.clear();
                    if let Err(code) = events.process(&mut input, &mut output) {
                        ended_flag.store(true, Ordering::Release);
                        events.stopped(code.get(), 0);
                        return true;
                    }
                    match stop_rx.recv_timeout(interval.saturating_sub(tic.elapsed())) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
                    }
                }
            })
            .map_err(DriverError::Spawn)?;
        self.worker = Some(Worker {
            stop_tx,
            handle,
            ended,
        });
        tracing::debug!(interval = ?self.interval, "dummy stream started");
        Ok(())
    }

    /// Stops and joins the stream thread. Returns whether the thread had
    /// already ended the stream by itself.
    fn join(&mut self) -> Result<bool, DriverError> {
        let Some(worker) = self.worker.take() else {
            return Ok(true);
        };
        match worker.stop_tx.try_send(()) {
            // A pending request or a finished thread both mean it stops.
            Ok(()) | Err(TrySendError::Full(()) | TrySendError::Disconnected(())) => {}
        }
        if worker.handle.thread().id() == thread::current().id() {
            return Ok(true);
        }
        worker.handle.join().map_err(|_| DriverError::WorkerPanicked)
    }
}

impl Driver for DummyDriver {
    fn prepare(&mut self, in_channels: u32, out_channels: u32) -> DriverResult {
        self.channels = Some((in_channels, out_channels));
        Ok(())
    }

    fn start(&mut self) -> DriverResult {
        let started = self.spawn();
        self.errors.check(started)
    }

    fn stop(&mut self) -> DriverResult {
        let ended = self.join();
        if !self.errors.check(ended)? {
            self.events.stopped(0, 0);
        }
        Ok(())
    }

    fn release(&mut self) -> DriverResult {
        let joined = self.join();
        self.channels = None;
        self.errors.check(joined).map(|_| ())
    }

    fn parse(&mut self, command: &str) -> DriverResult<String> {
        let parsed = self.params.parse(command);
        self.errors.check(parsed)
    }

    fn describe_error(&self, code: ErrorCode) -> String {
        self.errors.describe(code)
    }
}

impl Drop for DummyDriver {
    fn drop(&mut self) {
        if let Err(err) = self.join() {
            tracing::warn!(%err, "dummy stream thread did not shut down cleanly");
        }
    }
}
