use auricle_sdk::{
    AcBuffer, AcSpace, Module, ModuleError, ModuleResult, SignalFormat, SpecToSpec, Spectrum,
    WaveToWave, Waveform,
};

pub const NAME: &str = "acframeno";

/// Publishes the number of blocks processed since prepare as an int AC
/// variable named after the instance.
pub struct FrameCounter {
    ac: AcSpace,
    name: String,
    counter: AcBuffer<i32>,
}

impl FrameCounter {
    pub fn new(ac: AcSpace, name: impl Into<String>) -> Self {
        Self {
            ac,
            name: name.into(),
            counter: AcBuffer::scalar(0),
        }
    }

    pub fn count(&self) -> i32 {
        self.counter.read()[0]
    }

    fn advance(&self) {
        self.counter
            .publish(|value| value[0] = value[0].wrapping_add(1));
    }
}

impl Module for FrameCounter {
    fn prepare(&mut self, _format: &mut SignalFormat) -> ModuleResult<()> {
        self.counter.write()[0] = 0;
        self.ac.insert(&self.name, self.counter.variable())?;
        Ok(())
    }

    fn release(&mut self) -> ModuleResult<()> {
        self.ac.erase_by_name(&self.name).map_err(ModuleError::from)
    }

    fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
        Some(self)
    }

    fn spec_to_spec(&mut self) -> Option<&mut dyn SpecToSpec> {
        Some(self)
    }
}

impl WaveToWave for FrameCounter {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform> {
        self.advance();
        Ok(input)
    }
}

impl SpecToSpec for FrameCounter {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Spectrum> {
        self.advance();
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_visible_between_prepare_and_release() {
        let ac = AcSpace::new();
        let mut counter = FrameCounter::new(ac.clone(), "frames");
        let mut format = SignalFormat::waveform(1, 8, 16_000.0);
        counter.prepare(&mut format).expect("prepare");

        let mut block = Waveform::new(8, 1);
        for _ in 0..3 {
            WaveToWave::process(&mut counter, &mut block).expect("process");
        }
        assert_eq!(ac.get_int("frames").expect("counter"), 3);

        counter.release().expect("release");
        assert!(!ac.contains("frames"));

        counter.prepare(&mut format).expect("prepare again");
        assert_eq!(ac.get_int("frames").expect("restarted"), 0);
    }
}
