use std::fmt;
use std::num::NonZeroI32;
use std::sync::Arc;

use crate::module::{ModuleDescriptor, ModuleResult};
use crate::signal::Waveform;

/// Non-zero status code returned by a driver. Its meaning is only known to
/// the driver that produced it, see [`Driver::describe_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(NonZeroI32);

impl ErrorCode {
    /// Returned to the driver when the host failed to process a block.
    pub const PROCESS_FAILED: ErrorCode = match NonZeroI32::new(1) {
        Some(code) => ErrorCode(code),
        None => unreachable!(),
    };

    pub const fn new(code: i32) -> Option<Self> {
        match NonZeroI32::new(code) {
            Some(code) => Some(Self(code)),
            None => None,
        }
    }

    pub const fn get(self) -> i32 {
        self.0.get()
    }

    /// Folds an optional code into the integer convention where zero means
    /// success.
    pub fn to_raw(code: Option<ErrorCode>) -> i32 {
        code.map(ErrorCode::get).unwrap_or(0)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {}", self.get())
    }
}

pub type DriverResult<T = ()> = Result<T, ErrorCode>;

/// Callbacks a driver raises, possibly from its own thread. The driver
/// serialises calls into one instance.
pub trait StreamEvents: Send + Sync {
    /// Processes one block. The output block is resized by the host to the
    /// negotiated output shape.
    fn process(&self, input: &mut Waveform, output: &mut Waveform) -> DriverResult;

    fn started(&self);

    /// `proc_error` is the code returned by [`StreamEvents::process`] that
    /// made the driver stop, `io_error` a driver specific code. Zero means no
    /// error.
    fn stopped(&self, proc_error: i32, io_error: i32);
}

/// Construction parameters of a driver.
#[derive(Clone)]
pub struct DriverContext {
    pub fragsize: u32,
    pub srate: f32,
    pub events: Arc<dyn StreamEvents>,
}

impl fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverContext")
            .field("fragsize", &self.fragsize)
            .field("srate", &self.srate)
            .finish_non_exhaustive()
    }
}

/// Audio input/output driver. Dropping the driver destroys it.
pub trait Driver: Send {
    fn prepare(&mut self, in_channels: u32, out_channels: u32) -> DriverResult;
    fn start(&mut self) -> DriverResult;
    fn stop(&mut self) -> DriverResult;
    fn release(&mut self) -> DriverResult;

    /// Driver parameter interface.
    fn parse(&mut self, command: &str) -> DriverResult<String>;

    fn describe_error(&self, code: ErrorCode) -> String;
}

pub trait DriverFactory: Send + Sync {
    fn descriptor(&self) -> ModuleDescriptor;
    fn create(&self, context: DriverContext) -> ModuleResult<Box<dyn Driver>>;
}

/// Factory built from a descriptor and a constructor closure.
pub struct FnDriverFactory<F> {
    descriptor: ModuleDescriptor,
    create: F,
}

impl<F> FnDriverFactory<F>
where
    F: Fn(DriverContext) -> ModuleResult<Box<dyn Driver>> + Send + Sync,
{
    pub fn new(descriptor: ModuleDescriptor, create: F) -> Self {
        Self { descriptor, create }
    }
}

impl<F> DriverFactory for FnDriverFactory<F>
where
    F: Fn(DriverContext) -> ModuleResult<Box<dyn Driver>> + Send + Sync,
{
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }

    fn create(&self, context: DriverContext) -> ModuleResult<Box<dyn Driver>> {
        (self.create)(context)
    }
}
