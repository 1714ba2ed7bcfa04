use auricle_sdk::{
    Module, ModuleResult, SpecToSpec, Spectrum, WaveToWave, Waveform,
};

pub const NAME: &str = "identity";

/// Returns its input unchanged, in either domain.
#[derive(Debug, Default)]
pub struct Identity;

impl WaveToWave for Identity {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform> {
        Ok(input)
    }
}

impl SpecToSpec for Identity {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Spectrum> {
        Ok(input)
    }
}

impl Module for Identity {
    fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
        Some(self)
    }

    fn spec_to_spec(&mut self) -> Option<&mut dyn SpecToSpec> {
        Some(self)
    }
}
