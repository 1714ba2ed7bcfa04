use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ac::{AcError, AcSpace};
use crate::format::{Domain, SignalFormat};
use crate::registry::Registry;
use crate::signal::{Spectrum, Waveform};

/// Errors raised by module and driver code.
///
/// Messages containing `Fatal error` are routed to the fatal log by the
/// engine.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{0}")]
    Message(String),
    #[error("Fatal error: {0}")]
    Fatal(String),
    #[error(transparent)]
    Ac(#[from] AcError),
    #[error("unknown parameter \"{0}\"")]
    UnknownParameter(String),
    #[error("invalid value \"{value}\" for parameter \"{name}\": {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ModuleError {
    pub fn msg(message: impl Into<String>) -> Self {
        ModuleError::Message(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ModuleError::Fatal(message.into())
    }
}

pub type ModuleResult<T> = Result<T, ModuleError>;

/// One of the four input to output domain pairs a module may process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    WaveToWave,
    WaveToSpec,
    SpecToWave,
    SpecToSpec,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::WaveToWave,
        Transition::WaveToSpec,
        Transition::SpecToWave,
        Transition::SpecToSpec,
    ];

    pub fn between(input: Domain, output: Domain) -> Self {
        match (input, output) {
            (Domain::Waveform, Domain::Waveform) => Transition::WaveToWave,
            (Domain::Waveform, Domain::Spectrum) => Transition::WaveToSpec,
            (Domain::Spectrum, Domain::Waveform) => Transition::SpecToWave,
            (Domain::Spectrum, Domain::Spectrum) => Transition::SpecToSpec,
        }
    }

    pub fn input(self) -> Domain {
        match self {
            Transition::WaveToWave | Transition::WaveToSpec => Domain::Waveform,
            Transition::SpecToWave | Transition::SpecToSpec => Domain::Spectrum,
        }
    }

    pub fn output(self) -> Domain {
        match self {
            Transition::WaveToWave | Transition::SpecToWave => Domain::Waveform,
            Transition::WaveToSpec | Transition::SpecToSpec => Domain::Spectrum,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Transition::WaveToWave => 0x1,
            Transition::WaveToSpec => 0x2,
            Transition::SpecToWave => 0x4,
            Transition::SpecToSpec => 0x8,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.input(), self.output())
    }
}

/// Set of transitions a module instance exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    bits: u8,
}

impl Capabilities {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, transition: Transition) -> Self {
        self.insert(transition);
        self
    }

    pub fn insert(&mut self, transition: Transition) {
        self.bits |= transition.bit();
    }

    pub fn contains(&self, transition: Transition) -> bool {
        self.bits & transition.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Transition> + '_ {
        Transition::ALL
            .into_iter()
            .filter(|transition| self.contains(*transition))
    }

    /// Asks each capability accessor of `module` whether it is present.
    pub fn probe(module: &mut dyn Module) -> Self {
        let mut capabilities = Self::empty();
        if module.wave_to_wave().is_some() {
            capabilities.insert(Transition::WaveToWave);
        }
        if module.wave_to_spec().is_some() {
            capabilities.insert(Transition::WaveToSpec);
        }
        if module.spec_to_wave().is_some() {
            capabilities.insert(Transition::SpecToWave);
        }
        if module.spec_to_spec().is_some() {
            capabilities.insert(Transition::SpecToSpec);
        }
        capabilities
    }
}

pub trait WaveToWave {
    /// Returns either `input` processed in place or a block owned by the
    /// module. The result stays valid until the next call.
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform>;
}

pub trait WaveToSpec {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Spectrum>;
}

pub trait SpecToWave {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Waveform>;
}

pub trait SpecToSpec {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Spectrum>;
}

/// Text based parameter interface of a module or driver.
pub trait Configurable {
    /// Executes one command such as `gains=[0 6]` or `gains?` and returns its
    /// textual result.
    fn parse(&mut self, command: &str) -> ModuleResult<String>;
}

/// A processing module instance.
///
/// Every hook is optional. The host probes the four process accessors once
/// after construction; a module that returns `None` from all of them cannot
/// be prepared.
pub trait Module: Send {
    /// Receives the proposed input format and rewrites it to the output
    /// format the module will produce.
    fn prepare(&mut self, _format: &mut SignalFormat) -> ModuleResult<()> {
        Ok(())
    }

    fn release(&mut self) -> ModuleResult<()> {
        Ok(())
    }

    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        None
    }

    fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
        None
    }

    fn wave_to_spec(&mut self) -> Option<&mut dyn WaveToSpec> {
        None
    }

    fn spec_to_wave(&mut self) -> Option<&mut dyn SpecToWave> {
        None
    }

    fn spec_to_spec(&mut self) -> Option<&mut dyn SpecToSpec> {
        None
    }
}

/// Static metadata of a module or driver library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub documentation: String,
    pub categories: Vec<String>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documentation: String::new(),
            categories: Vec::new(),
        }
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }
}

/// Everything a module receives at construction.
#[derive(Clone)]
pub struct ModuleContext {
    pub ac: AcSpace,
    pub chain: String,
    pub instance: String,
    /// Registry the module was resolved from, for modules that host others.
    pub registry: Arc<Registry>,
    pub library_path: Vec<PathBuf>,
}

impl ModuleContext {
    pub fn new(ac: AcSpace, instance: impl Into<String>) -> Self {
        Self {
            ac,
            chain: String::from("(no chain)"),
            instance: instance.into(),
            registry: Arc::new(Registry::new()),
            library_path: Vec::new(),
        }
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = chain.into();
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_library_path(mut self, library_path: Vec<PathBuf>) -> Self {
        self.library_path = library_path;
        self
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("chain", &self.chain)
            .field("instance", &self.instance)
            .field("library_path", &self.library_path)
            .finish_non_exhaustive()
    }
}

pub trait ModuleFactory: Send + Sync {
    fn descriptor(&self) -> ModuleDescriptor;
    fn create(&self, context: &ModuleContext) -> ModuleResult<Box<dyn Module>>;
}

/// Factory built from a descriptor and a constructor closure.
pub struct FnModuleFactory<F> {
    descriptor: ModuleDescriptor,
    create: F,
}

impl<F> FnModuleFactory<F>
where
    F: Fn(&ModuleContext) -> ModuleResult<Box<dyn Module>> + Send + Sync,
{
    pub fn new(descriptor: ModuleDescriptor, create: F) -> Self {
        Self { descriptor, create }
    }
}

impl<F> ModuleFactory for FnModuleFactory<F>
where
    F: Fn(&ModuleContext) -> ModuleResult<Box<dyn Module>> + Send + Sync,
{
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }

    fn create(&self, context: &ModuleContext) -> ModuleResult<Box<dyn Module>> {
        (self.create)(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl WaveToWave for Passthrough {
        fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform> {
            Ok(input)
        }
    }

    impl Module for Passthrough {
        fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
            Some(self)
        }
    }

    struct Silent;

    impl Module for Silent {}

    #[test]
    fn probing_reports_only_present_accessors() {
        let capabilities = Capabilities::probe(&mut Passthrough);
        assert!(capabilities.contains(Transition::WaveToWave));
        assert!(!capabilities.contains(Transition::SpecToSpec));
        assert_eq!(capabilities.iter().count(), 1);

        assert!(Capabilities::probe(&mut Silent).is_empty());
    }

    #[test]
    fn transitions_map_domains_both_ways() {
        for transition in Transition::ALL {
            assert_eq!(
                Transition::between(transition.input(), transition.output()),
                transition
            );
        }
        assert_eq!(
            Transition::SpecToWave.to_string(),
            "spectrum to waveform"
        );
    }

    #[test]
    fn fatal_errors_carry_the_marker() {
        let err = ModuleError::fatal("filter unstable");
        assert!(err.to_string().contains("Fatal error"));
    }
}
