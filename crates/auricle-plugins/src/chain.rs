use auricle_host::{HostError, LibraryResolver, ProcessingChain};
use auricle_sdk::{
    AcSpace, Configurable, Module, ModuleContext, ModuleError, ModuleResult, SignalFormat,
    SignalMut, SpecToSpec, SpecToWave, Spectrum, WaveToSpec, WaveToWave, Waveform,
};

use crate::command::{self, Command};

pub const NAME: &str = "chain";

/// Runs a list of modules as one. `algos=[a b:c]` loads the list; every
/// other `instance.param` command is forwarded to the stage called
/// `instance`.
pub struct Chain {
    resolver: LibraryResolver,
    ac: AcSpace,
    name: String,
    algos: Vec<String>,
    chain: Option<ProcessingChain>,
}

impl Chain {
    pub fn new(context: &ModuleContext) -> Self {
        Self {
            resolver: LibraryResolver::from_context(context),
            ac: context.ac.clone(),
            name: context.instance.clone(),
            algos: Vec::new(),
            chain: None,
        }
    }

    pub fn instances(&self) -> Vec<String> {
        self.chain
            .as_ref()
            .map(ProcessingChain::instances)
            .unwrap_or_default()
    }

    fn is_prepared(&self) -> bool {
        self.chain
            .as_ref()
            .is_some_and(ProcessingChain::is_prepared)
    }

    fn load(&mut self, value: &str) -> ModuleResult<()> {
        if self.is_prepared() {
            return Err(ModuleError::msg(format!(
                "The chain {} cannot be reloaded while prepared.",
                self.name
            )));
        }
        let algos: Vec<String> = command::list(value)?
            .into_iter()
            .map(str::to_owned)
            .collect();
        // Stages of the old list are dropped before the new ones are created.
        self.chain = None;
        self.algos.clear();
        let chain = ProcessingChain::load(&self.resolver, &self.ac, self.name.as_str(), &algos)
            .map_err(host_error)?;
        tracing::debug!(chain = %self.name, stages = chain.len(), "chain loaded");
        self.chain = Some(chain);
        self.algos = algos;
        Ok(())
    }

    fn dump(&mut self) -> ModuleResult<String> {
        let mut lines = vec![format!("algos = {}", command::render_list(&self.algos))];
        for instance in self.instances() {
            let Some(chain) = self.chain.as_mut() else {
                break;
            };
            if let Ok(dump) = chain.parse(&format!("{instance}.?")) {
                lines.extend(dump.lines().map(|line| format!("{instance}.{line}")));
            }
        }
        Ok(lines.join("\n"))
    }
}

fn host_error(err: HostError) -> ModuleError {
    ModuleError::msg(err.to_string())
}

impl Configurable for Chain {
    fn parse(&mut self, line: &str) -> ModuleResult<String> {
        match Command::split(line) {
            Command::Write {
                name: "algos",
                value,
            } => self.load(value).map(|()| String::new()),
            Command::Query {
                name: "algos",
                query: "" | "val",
            } => Ok(command::render_list(&self.algos)),
            Command::Query {
                name: "algos",
                query: "help",
            } => Ok("Modules of the chain, in processing order".to_owned()),
            Command::Query { name: "", query: "" } => self.dump(),
            Command::Query {
                name: "",
                query: "ls",
            } => {
                let mut names = vec!["algos".to_owned()];
                names.extend(self.instances());
                Ok(command::render_list(&names))
            }
            Command::Write { name, .. } | Command::Query { name, .. } if name.contains('.') => {
                match self.chain.as_mut() {
                    Some(chain) => chain.parse(line.trim()).map_err(host_error),
                    None => Err(ModuleError::UnknownParameter(name.to_owned())),
                }
            }
            Command::Write { name, .. } | Command::Query { name, .. } => {
                Err(ModuleError::UnknownParameter(name.to_owned()))
            }
        }
    }
}

impl Module for Chain {
    fn prepare(&mut self, format: &mut SignalFormat) -> ModuleResult<()> {
        if let Some(chain) = self.chain.as_mut() {
            *format = chain.prepare(*format).map_err(host_error)?;
        }
        Ok(())
    }

    fn release(&mut self) -> ModuleResult<()> {
        match self.chain.as_mut() {
            Some(chain) => chain.release().map_err(host_error),
            None => Ok(()),
        }
    }

    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }

    fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
        Some(self)
    }

    fn wave_to_spec(&mut self) -> Option<&mut dyn WaveToSpec> {
        Some(self)
    }

    fn spec_to_wave(&mut self) -> Option<&mut dyn SpecToWave> {
        Some(self)
    }

    fn spec_to_spec(&mut self) -> Option<&mut dyn SpecToSpec> {
        Some(self)
    }
}

impl Chain {
    fn run<'a>(&'a mut self, input: SignalMut<'a>) -> ModuleResult<SignalMut<'a>> {
        match self.chain.as_mut() {
            Some(chain) => chain.process(input).map_err(host_error),
            None => Ok(input),
        }
    }
}

fn wrong_domain() -> ModuleError {
    ModuleError::msg("The chain produced a signal in an unexpected domain.")
}

impl WaveToWave for Chain {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform> {
        self.run(SignalMut::Wave(input))?
            .into_wave()
            .ok_or_else(wrong_domain)
    }
}

impl WaveToSpec for Chain {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Spectrum> {
        self.run(SignalMut::Wave(input))?
            .into_spec()
            .ok_or_else(wrong_domain)
    }
}

impl SpecToWave for Chain {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Waveform> {
        self.run(SignalMut::Spec(input))?
            .into_wave()
            .ok_or_else(wrong_domain)
    }
}

impl SpecToSpec for Chain {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Spectrum> {
        self.run(SignalMut::Spec(input))?
            .into_spec()
            .ok_or_else(wrong_domain)
    }
}
