use auricle_sdk::{
    Configurable, Module, ModuleError, ModuleResult, SignalFormat, SpecToSpec, Spectrum,
    WaveToWave, Waveform,
};

use crate::command::{self, Command};

pub const NAME: &str = "gain";

const DEFAULT_MIN_DB: f32 = -16.0;
const DEFAULT_MAX_DB: f32 = 16.0;

/// Per-channel gain in dB. `gains` holds one value per channel or a single
/// value for all channels, limited to `[min, max]`.
#[derive(Debug, Clone)]
pub struct Gain {
    gains: Vec<f32>,
    min: f32,
    max: f32,
    channels: Option<usize>,
    factors: Vec<f32>,
}

impl Default for Gain {
    fn default() -> Self {
        Self {
            gains: vec![0.0],
            min: DEFAULT_MIN_DB,
            max: DEFAULT_MAX_DB,
            channels: None,
            factors: Vec::new(),
        }
    }
}

impl Gain {
    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    /// Linear factors in use, one per channel. Empty while unprepared.
    pub fn factors(&self) -> &[f32] {
        &self.factors
    }

    fn set_gains(&mut self, text: &str) -> ModuleResult<()> {
        let gains = command::float_list("gains", text)?;
        if let Some(gain) = gains.iter().find(|gain| **gain < self.min || **gain > self.max) {
            return Err(ModuleError::InvalidValue {
                name: "gains".into(),
                value: text.into(),
                reason: format!("{gain} dB is outside [{}, {}]", self.min, self.max),
            });
        }
        let factors = match self.channels {
            Some(channels) => linear_factors(&gains, channels)?,
            None => Vec::new(),
        };
        self.gains = gains;
        self.factors = factors;
        Ok(())
    }

    fn set_limits(&mut self, min: f32, max: f32) -> ModuleResult<()> {
        if min > 0.0 || max < 0.0 {
            return Err(ModuleError::msg(format!(
                "The gain range [{min}, {max}] must include 0 dB."
            )));
        }
        self.min = min;
        self.max = max;
        for gain in &mut self.gains {
            *gain = gain.clamp(min, max);
        }
        if let Some(channels) = self.channels {
            self.factors = linear_factors(&self.gains, channels)?;
        }
        Ok(())
    }
}

impl Configurable for Gain {
    fn parse(&mut self, line: &str) -> ModuleResult<String> {
        match Command::split(line) {
            Command::Write {
                name: "gains",
                value,
            } => self.set_gains(value).map(|()| String::new()),
            Command::Write { name: "min", value } => {
                let min = command::float("min", value)?;
                self.set_limits(min, self.max).map(|()| String::new())
            }
            Command::Write { name: "max", value } => {
                let max = command::float("max", value)?;
                self.set_limits(self.min, max).map(|()| String::new())
            }
            Command::Query {
                name: "gains",
                query: "" | "val",
            } => Ok(command::render_list(&self.gains)),
            Command::Query {
                name: "gains",
                query: "help",
            } => Ok("Gain in dB".to_owned()),
            Command::Query {
                name: "min",
                query: "" | "val",
            } => Ok(self.min.to_string()),
            Command::Query {
                name: "max",
                query: "" | "val",
            } => Ok(self.max.to_string()),
            Command::Query { name: "", query: "" } => Ok(format!(
                "min = {}\nmax = {}\ngains = {}",
                self.min,
                self.max,
                command::render_list(&self.gains)
            )),
            Command::Query {
                name: "",
                query: "ls",
            } => Ok("[min max gains]".to_owned()),
            Command::Write { name, .. } | Command::Query { name, .. } => {
                Err(ModuleError::UnknownParameter(name.to_owned()))
            }
        }
    }
}

impl Module for Gain {
    fn prepare(&mut self, format: &mut SignalFormat) -> ModuleResult<()> {
        let channels = format.channels as usize;
        self.factors = linear_factors(&self.gains, channels)?;
        self.channels = Some(channels);
        Ok(())
    }

    fn release(&mut self) -> ModuleResult<()> {
        self.channels = None;
        self.factors.clear();
        Ok(())
    }

    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }

    fn wave_to_wave(&mut self) -> Option<&mut dyn WaveToWave> {
        Some(self)
    }

    fn spec_to_spec(&mut self) -> Option<&mut dyn SpecToSpec> {
        Some(self)
    }
}

impl WaveToWave for Gain {
    fn process<'a>(&'a mut self, input: &'a mut Waveform) -> ModuleResult<&'a mut Waveform> {
        check_channels(self.factors.len(), input.channels())?;
        let channels = input.channels();
        for (index, sample) in input.as_mut_slice().iter_mut().enumerate() {
            *sample *= self.factors[index % channels];
        }
        Ok(input)
    }
}

impl SpecToSpec for Gain {
    fn process<'a>(&'a mut self, input: &'a mut Spectrum) -> ModuleResult<&'a mut Spectrum> {
        check_channels(self.factors.len(), input.channels())?;
        for (channel, factor) in self.factors.iter().enumerate() {
            for bin in input.channel_mut(channel) {
                *bin *= *factor;
            }
        }
        Ok(input)
    }
}

fn linear_factors(gains: &[f32], channels: usize) -> ModuleResult<Vec<f32>> {
    let linear = |db: f32| 10f32.powf(0.05 * db);
    match gains {
        [gain] => Ok(vec![linear(*gain); channels]),
        gains if gains.len() == channels => Ok(gains.iter().copied().map(linear).collect()),
        _ => Err(ModuleError::msg(format!(
            "The number of entries in the gain vector must be either {channels} \
             (one per channel) or 1 (same gains for all channels)"
        ))),
    }
}

fn check_channels(expected: usize, found: usize) -> ModuleResult<()> {
    if expected != found {
        return Err(ModuleError::msg(format!(
            "Gain is configured for {expected} channels, the signal has {found}."
        )));
    }
    Ok(())
}
