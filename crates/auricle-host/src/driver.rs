use std::fmt;

use auricle_sdk::{Driver, DriverContext, DriverResult, ErrorCode, ModuleDescriptor};

use crate::error::{HostError, Result};
use crate::library::{instantiate, LibraryOrigin, LibraryResolver};

/// A loaded audio driver. Every call that returns a driver error code is
/// translated into [`HostError::Driver`] carrying the driver's own
/// description of the code.
pub struct DriverLibrary {
    driver: Box<dyn Driver>,
    descriptor: ModuleDescriptor,
    origin: LibraryOrigin,
}

impl DriverLibrary {
    /// Resolves and instantiates the driver `name`. The driver receives the
    /// block size, sample rate and callback target through `context`.
    pub fn load(resolver: &LibraryResolver, name: &str, context: DriverContext) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HostError::EmptyLibraryName);
        }
        let handle = resolver.driver_factory(name)?;
        let (driver, descriptor, origin) = instantiate(handle, |factory| {
            factory
                .create(context)
                .map_err(|err| HostError::module(name, name, err))
        })?;
        tracing::debug!(driver = name, origin = ?origin, "driver loaded");
        Ok(Self {
            driver,
            descriptor,
            origin,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn documentation(&self) -> &str {
        &self.descriptor.documentation
    }

    pub fn origin(&self) -> &LibraryOrigin {
        &self.origin
    }

    pub fn prepare(&mut self, in_channels: u32, out_channels: u32) -> Result<()> {
        let result = self.driver.prepare(in_channels, out_channels);
        self.check(result)
    }

    pub fn start(&mut self) -> Result<()> {
        let result = self.driver.start();
        self.check(result)
    }

    pub fn stop(&mut self) -> Result<()> {
        let result = self.driver.stop();
        self.check(result)
    }

    pub fn release(&mut self) -> Result<()> {
        let result = self.driver.release();
        self.check(result)
    }

    pub fn parse(&mut self, command: &str) -> Result<String> {
        let result = self.driver.parse(command);
        self.check(result)
    }

    /// Text for a raw code as delivered to `stopped`. Zero gives an empty
    /// string.
    pub fn describe_error(&self, code: i32) -> String {
        ErrorCode::new(code)
            .map(|code| self.driver.describe_error(code))
            .unwrap_or_default()
    }

    fn check<T>(&self, result: DriverResult<T>) -> Result<T> {
        result.map_err(|code| HostError::Driver(self.driver.describe_error(code)))
    }
}

impl fmt::Debug for DriverLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverLibrary")
            .field("name", &self.descriptor.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use auricle_sdk::{FnDriverFactory, Registry, StreamEvents, Waveform};

    use super::*;

    struct Refusing;

    impl Driver for Refusing {
        fn prepare(&mut self, in_channels: u32, _out_channels: u32) -> DriverResult {
            ErrorCode::new(in_channels as i32).map_or(Ok(()), Err)
        }
        fn start(&mut self) -> DriverResult {
            Ok(())
        }
        fn stop(&mut self) -> DriverResult {
            Ok(())
        }
        fn release(&mut self) -> DriverResult {
            Ok(())
        }
        fn parse(&mut self, _command: &str) -> DriverResult<String> {
            Ok(String::new())
        }
        fn describe_error(&self, code: ErrorCode) -> String {
            format!("cannot open {} channels", code.get())
        }
    }

    struct Nothing;

    impl StreamEvents for Nothing {
        fn process(&self, _input: &mut Waveform, _output: &mut Waveform) -> DriverResult {
            Ok(())
        }
        fn started(&self) {}
        fn stopped(&self, _proc_error: i32, _io_error: i32) {}
    }

    #[test]
    fn driver_codes_become_io_errors() {
        let mut registry = Registry::new();
        registry.register_driver(Box::new(FnDriverFactory::new(
            ModuleDescriptor::new("refusing"),
            |_| Ok(Box::new(Refusing) as Box<dyn Driver>),
        )));
        let resolver = LibraryResolver::new(Arc::new(registry)).with_search_path(Vec::new());
        let context = DriverContext {
            fragsize: 64,
            srate: 48_000.0,
            events: Arc::new(Nothing),
        };
        let mut driver = DriverLibrary::load(&resolver, " refusing ", context).expect("load");

        driver.prepare(0, 0).expect("zero channels accepted");
        let err = driver.prepare(3, 3).expect_err("refused");
        assert_eq!(err.to_string(), "IO error: cannot open 3 channels");
        assert_eq!(driver.describe_error(0), "");
        assert_eq!(driver.describe_error(5), "cannot open 5 channels");
    }
}
