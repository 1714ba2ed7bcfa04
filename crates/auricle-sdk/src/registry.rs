use crate::driver::DriverFactory;
use crate::module::ModuleFactory;

/// Modules and drivers linked into the host binary, looked up by library
/// name before the library search path is consulted.
#[derive(Default)]
pub struct Registry {
    modules: Vec<Box<dyn ModuleFactory>>,
    drivers: Vec<Box<dyn DriverFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module factory, replacing one of the same name.
    pub fn register_module(&mut self, factory: Box<dyn ModuleFactory>) -> &mut Self {
        let name = factory.descriptor().name;
        self.modules
            .retain(|existing| existing.descriptor().name != name);
        self.modules.push(factory);
        self
    }

    /// Registers a driver factory, replacing one of the same name.
    pub fn register_driver(&mut self, factory: Box<dyn DriverFactory>) -> &mut Self {
        let name = factory.descriptor().name;
        self.drivers
            .retain(|existing| existing.descriptor().name != name);
        self.drivers.push(factory);
        self
    }

    pub fn module(&self, name: &str) -> Option<&dyn ModuleFactory> {
        self.modules
            .iter()
            .find(|factory| factory.descriptor().name == name)
            .map(|factory| factory.as_ref())
    }

    pub fn driver(&self, name: &str) -> Option<&dyn DriverFactory> {
        self.drivers
            .iter()
            .find(|factory| factory.descriptor().name == name)
            .map(|factory| factory.as_ref())
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|factory| factory.descriptor().name)
            .collect()
    }

    pub fn driver_names(&self) -> Vec<String> {
        self.drivers
            .iter()
            .map(|factory| factory.descriptor().name)
            .collect()
    }
}

/// Value returned by the entry point of a dynamic module library.
pub struct ModuleExport {
    factory: Box<dyn ModuleFactory>,
}

impl ModuleExport {
    pub fn new(factory: Box<dyn ModuleFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &dyn ModuleFactory {
        self.factory.as_ref()
    }

    pub fn into_factory(self) -> Box<dyn ModuleFactory> {
        self.factory
    }
}

/// Value returned by the entry point of a dynamic driver library.
pub struct DriverExport {
    factory: Box<dyn DriverFactory>,
}

impl DriverExport {
    pub fn new(factory: Box<dyn DriverFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &dyn DriverFactory {
        self.factory.as_ref()
    }

    pub fn into_factory(self) -> Box<dyn DriverFactory> {
        self.factory
    }
}
