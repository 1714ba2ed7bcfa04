//! Audio drivers shipped with the Auricle host.
//!
//! * [`DummyDriver`] (`dummy`) clocks silent blocks through the engine from
//!   its own thread at the configured block rate.
//! * [`WavFileDriver`] (`wavfile`) processes a WAV file into another one.

mod dummy;
mod error;
mod params;
mod wavfile;

use auricle_sdk::{Driver, FnDriverFactory, ModuleDescriptor, ModuleError, Registry};

pub use dummy::DummyDriver;
pub use error::{DriverError, USER_ERROR};
pub use wavfile::WavFileDriver;

/// Adds the drivers of this crate to `registry`.
pub fn register(registry: &mut Registry) {
    registry.register_driver(Box::new(FnDriverFactory::new(
        ModuleDescriptor::new(dummy::NAME)
            .with_documentation(
                "Simulated real-time stream. Input is always zero, output is discarded.",
            )
            .with_category("io"),
        |context| {
            DummyDriver::new(context)
                .map(|driver| Box::new(driver) as Box<dyn Driver>)
                .map_err(|err| ModuleError::msg(err.to_string()))
        },
    )));
    registry.register_driver(Box::new(FnDriverFactory::new(
        ModuleDescriptor::new(wavfile::NAME)
            .with_documentation(
                "Sound file client. Reads an input WAV file and writes the processed \
                 signal to an output file of the same format.",
            )
            .with_category("io"),
        |context| Ok(Box::new(WavFileDriver::new(context)) as Box<dyn Driver>),
    )));
}
