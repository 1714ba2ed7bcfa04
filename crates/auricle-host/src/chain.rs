use auricle_sdk::{AcSpace, SignalFormat, SignalMut};

use crate::compare::compare_formats;
use crate::error::{HostError, Result};
use crate::library::LibraryResolver;
use crate::loader::ModuleLoader;

/// Ordered list of modules sharing one AC space. Each stage is offered the
/// output format of the stage before it.
#[derive(Debug)]
pub struct ProcessingChain {
    name: String,
    stages: Vec<ModuleLoader>,
    prepared: bool,
}

impl ProcessingChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            prepared: false,
        }
    }

    /// Loads every specifier in order. Stages loaded before a failure are
    /// dropped again.
    pub fn load<I, S>(
        resolver: &LibraryResolver,
        ac: &AcSpace,
        name: impl Into<String>,
        specifiers: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chain = Self::new(name);
        for specifier in specifiers {
            let stage = ModuleLoader::load_in_chain(resolver, ac, specifier.as_ref(), &chain.name)?;
            chain.push(stage)?;
        }
        Ok(chain)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, stage: ModuleLoader) -> Result<()> {
        if self.prepared {
            return Err(HostError::AlreadyPrepared(self.name.clone()));
        }
        self.stages.push(stage);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn stages(&self) -> &[ModuleLoader] {
        &self.stages
    }

    pub fn instances(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| stage.instance().to_owned())
            .collect()
    }

    pub fn stage_mut(&mut self, instance: &str) -> Option<&mut ModuleLoader> {
        self.stages
            .iter_mut()
            .find(|stage| stage.instance() == instance)
    }

    /// Prepares all stages front to back and returns the output format of
    /// the last one. When a stage fails, the stages already prepared are
    /// released in reverse order before the error is returned.
    pub fn prepare(&mut self, proposed: SignalFormat) -> Result<SignalFormat> {
        if self.prepared {
            return Err(HostError::AlreadyPrepared(self.name.clone()));
        }
        let mut format = proposed;
        for index in 0..self.stages.len() {
            match self.stages[index].prepare(format) {
                Ok(output) => format = output,
                Err(err) => {
                    self.roll_back(index);
                    return Err(err);
                }
            }
        }
        if let Err(err) = self.check_links() {
            self.roll_back(self.stages.len());
            return Err(err);
        }
        self.prepared = true;
        tracing::debug!(chain = %self.name, stages = self.stages.len(), "chain prepared");
        Ok(format)
    }

    /// Releases all stages back to front. Every stage is released even when
    /// an earlier one fails; the first failure is returned.
    pub fn release(&mut self) -> Result<()> {
        self.prepared = false;
        let mut first_error = None;
        for stage in self.stages.iter_mut().rev() {
            if let Err(err) = stage.release() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn process<'a>(&'a mut self, input: SignalMut<'a>) -> Result<SignalMut<'a>> {
        let mut signal = input;
        for stage in self.stages.iter_mut() {
            signal = stage.process(signal)?;
        }
        Ok(signal)
    }

    /// Routes `instance.command` to the named stage.
    pub fn parse(&mut self, command: &str) -> Result<String> {
        let (instance, rest) = command
            .split_once('.')
            .ok_or_else(|| HostError::NoConfigInterface(command.to_owned()))?;
        let stage = self
            .stage_mut(instance)
            .ok_or_else(|| HostError::NoConfigInterface(instance.to_owned()))?;
        stage.parse(rest)
    }

    fn check_links(&self) -> Result<()> {
        for pair in self.stages.windows(2) {
            let (Some(output), Some(input)) = (pair[0].output_format(), pair[1].input_format())
            else {
                continue;
            };
            let prefix = format!("{} -> {}", pair[0].instance(), pair[1].instance());
            compare_formats(&input, &output, &prefix)?;
        }
        Ok(())
    }

    fn roll_back(&mut self, prepared: usize) {
        for stage in self.stages[..prepared].iter_mut().rev() {
            if let Err(err) = stage.release() {
                tracing::warn!(
                    chain = %self.name,
                    instance = %stage.instance(),
                    %err,
                    "release during rollback failed"
                );
            }
        }
    }
}
