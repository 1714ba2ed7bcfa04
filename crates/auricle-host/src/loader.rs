use std::fmt;
use std::fs;

use auricle_sdk::{
    AcSpace, Capabilities, Module, ModuleContext, ModuleDescriptor, ModuleError, SignalFormat,
    SignalMut, Transition, Waveform,
};

use crate::error::{HostError, Result};
use crate::library::{instantiate, LibraryOrigin, LibraryResolver};
use crate::specifier::ModuleSpecifier;

const DEFAULT_CATEGORY: &str = "other";

/// Formats recorded by a successful [`ModuleLoader::prepare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Negotiation {
    pub input: SignalFormat,
    pub output: SignalFormat,
    pub transition: Transition,
}

/// One loaded processing module together with its negotiated format.
///
/// The module is declared before the library origin so that a module
/// created by a dynamic library is destroyed while the library is still
/// mapped.
pub struct ModuleLoader {
    module: Box<dyn Module>,
    specifier: ModuleSpecifier,
    descriptor: ModuleDescriptor,
    capabilities: Capabilities,
    has_parser: bool,
    negotiated: Option<Negotiation>,
    origin: LibraryOrigin,
}

impl ModuleLoader {
    /// Loads `library[:instance][<config-file]` outside of any chain.
    pub fn load(resolver: &LibraryResolver, ac: &AcSpace, specifier: &str) -> Result<Self> {
        Self::load_in_chain(resolver, ac, specifier, "(no chain)")
    }

    pub fn load_in_chain(
        resolver: &LibraryResolver,
        ac: &AcSpace,
        specifier: &str,
        chain: &str,
    ) -> Result<Self> {
        let specifier = ModuleSpecifier::parse(specifier)?;
        Self::from_specifier(resolver, ac, specifier, chain)
    }

    pub fn from_specifier(
        resolver: &LibraryResolver,
        ac: &AcSpace,
        specifier: ModuleSpecifier,
        chain: &str,
    ) -> Result<Self> {
        let handle = resolver.module_factory(&specifier.library)?;
        let context = resolver.context(
            ModuleContext::new(ac.clone(), specifier.instance.clone()).with_chain(chain),
        );
        let (mut module, mut descriptor, origin) = instantiate(handle, |factory| {
            factory
                .create(&context)
                .map_err(|err| HostError::module(&specifier.library, &specifier.instance, err))
        })?;

        let capabilities = Capabilities::probe(module.as_mut());
        if capabilities.is_empty() {
            drop(module);
            drop(origin);
            return Err(HostError::NoProcessCallbacks {
                library: specifier.library,
            });
        }
        if descriptor.categories.is_empty() {
            descriptor.categories.push(DEFAULT_CATEGORY.to_owned());
        }
        let has_parser = module.configurable().is_some();

        let mut loader = Self {
            module,
            specifier,
            descriptor,
            capabilities,
            has_parser,
            negotiated: None,
            origin,
        };
        if let Some(path) = loader.specifier.config_file.clone() {
            let text = fs::read_to_string(&path).map_err(|err| HostError::config_file(&path, err))?;
            for line in text.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                loader.parse(line)?;
            }
        }
        tracing::debug!(
            library = %loader.specifier.library,
            instance = %loader.specifier.instance,
            capabilities = ?loader.capabilities.iter().collect::<Vec<_>>(),
            origin = ?loader.origin,
            "module loaded"
        );
        Ok(loader)
    }

    pub fn library(&self) -> &str {
        &self.specifier.library
    }

    pub fn instance(&self) -> &str {
        &self.specifier.instance
    }

    pub fn specifier(&self) -> &ModuleSpecifier {
        &self.specifier
    }

    pub fn documentation(&self) -> &str {
        &self.descriptor.documentation
    }

    pub fn categories(&self) -> &[String] {
        &self.descriptor.categories
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn origin(&self) -> &LibraryOrigin {
        &self.origin
    }

    /// Whether the module accepted configuration commands when loaded.
    pub fn has_parser(&self) -> bool {
        self.has_parser
    }

    pub fn is_prepared(&self) -> bool {
        self.negotiated.is_some()
    }

    pub fn negotiation(&self) -> Option<Negotiation> {
        self.negotiated
    }

    pub fn input_format(&self) -> Option<SignalFormat> {
        self.negotiated.map(|negotiation| negotiation.input)
    }

    pub fn output_format(&self) -> Option<SignalFormat> {
        self.negotiated.map(|negotiation| negotiation.output)
    }

    /// Offers `proposed` to the module and returns the output format it
    /// declared.
    ///
    /// When the module has no process callback for the resulting domain pair
    /// its release hook is called once and the loader stays unprepared. A
    /// failing release is appended to the error but does not replace it.
    pub fn prepare(&mut self, proposed: SignalFormat) -> Result<SignalFormat> {
        if self.is_prepared() {
            return Err(HostError::AlreadyPrepared(self.specifier.to_string()));
        }
        let mut format = proposed;
        self.module
            .prepare(&mut format)
            .map_err(|err| self.module_error(err))?;

        let transition = Transition::between(proposed.domain, format.domain);
        if !self.capabilities.contains(transition) {
            let release_error = self.module.release().err().map(|err| err.to_string());
            return Err(HostError::NoMatchingProcessCallback {
                library: self.specifier.library.clone(),
                input: proposed.domain,
                output: format.domain,
                release_error,
            });
        }

        self.negotiated = Some(Negotiation {
            input: proposed,
            output: format,
            transition,
        });
        tracing::debug!(
            library = %self.specifier.library,
            instance = %self.specifier.instance,
            %transition,
            channels = format.channels,
            fragsize = format.fragsize,
            srate = format.srate,
            "module prepared"
        );
        Ok(format)
    }

    /// Calls the module's release hook. The loader counts as unprepared
    /// afterwards even when the hook fails.
    pub fn release(&mut self) -> Result<()> {
        if self.negotiated.take().is_none() {
            return Ok(());
        }
        tracing::debug!(instance = %self.specifier.instance, "module released");
        self.module.release().map_err(|err| self.module_error(err))
    }

    /// Runs the single callback matching the negotiated domain pair.
    pub fn process<'a>(&'a mut self, input: SignalMut<'a>) -> Result<SignalMut<'a>> {
        let transition = self
            .negotiated
            .map(|negotiation| negotiation.transition)
            .ok_or(HostError::ProcessingCallbackUndefined)?;
        let library = &self.specifier.library;
        let instance = &self.specifier.instance;
        let wrap = |err: ModuleError| HostError::module(library, instance, err);
        let undefined = || HostError::ProcessingCallbackUndefined;

        match (transition, input) {
            (Transition::WaveToWave, SignalMut::Wave(wave)) => self
                .module
                .wave_to_wave()
                .ok_or_else(undefined)?
                .process(wave)
                .map(SignalMut::Wave)
                .map_err(wrap),
            (Transition::WaveToSpec, SignalMut::Wave(wave)) => self
                .module
                .wave_to_spec()
                .ok_or_else(undefined)?
                .process(wave)
                .map(SignalMut::Spec)
                .map_err(wrap),
            (Transition::SpecToWave, SignalMut::Spec(spec)) => self
                .module
                .spec_to_wave()
                .ok_or_else(undefined)?
                .process(spec)
                .map(SignalMut::Wave)
                .map_err(wrap),
            (Transition::SpecToSpec, SignalMut::Spec(spec)) => self
                .module
                .spec_to_spec()
                .ok_or_else(undefined)?
                .process(spec)
                .map(SignalMut::Spec)
                .map_err(wrap),
            _ => Err(undefined()),
        }
    }

    /// Waveform to waveform shortcut used by the engine.
    pub fn process_wave<'a>(&'a mut self, input: &'a mut Waveform) -> Result<&'a mut Waveform> {
        self.process(SignalMut::Wave(input))?
            .into_wave()
            .ok_or(HostError::ProcessingCallbackUndefined)
    }

    /// Forwards a parameter command to the module's configuration interface.
    pub fn parse(&mut self, command: &str) -> Result<String> {
        let library = &self.specifier.library;
        let instance = &self.specifier.instance;
        let parser = self
            .module
            .configurable()
            .ok_or_else(|| HostError::NoConfigInterface(instance.clone()))?;
        parser
            .parse(command)
            .map_err(|err| HostError::module(library, instance, err))
    }

    fn module_error(&self, err: ModuleError) -> HostError {
        HostError::module(&self.specifier.library, &self.specifier.instance, err)
    }
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(instance = %self.specifier.instance, %err, "release on drop failed");
        }
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("specifier", &self.specifier)
            .field("capabilities", &self.capabilities)
            .field("negotiated", &self.negotiated)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
