use num_complex::Complex32;

use crate::format::SignalFormat;

/// Interleaved block of time-domain samples, `frames` x `channels`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Waveform {
    frames: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Waveform {
    pub fn new(frames: usize, channels: usize) -> Self {
        Self {
            frames,
            channels,
            data: vec![0.0; frames * channels],
        }
    }

    pub fn for_format(format: &SignalFormat) -> Self {
        Self::new(format.fragsize as usize, format.channels as usize)
    }

    /// Wraps interleaved samples. Returns `None` when the sample count is not
    /// a whole number of frames.
    pub fn from_interleaved(channels: usize, data: Vec<f32>) -> Option<Self> {
        if channels == 0 || data.len() % channels != 0 {
            return None;
        }
        Some(Self {
            frames: data.len() / channels,
            channels,
            data,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn value(&self, frame: usize, channel: usize) -> f32 {
        self.data[frame * self.channels + channel]
    }

    pub fn value_mut(&mut self, frame: usize, channel: usize) -> &mut f32 {
        &mut self.data[frame * self.channels + channel]
    }

    pub fn frame(&self, frame: usize) -> &[f32] {
        let start = frame * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Changes the block dimensions, zeroing the contents.
    pub fn resize(&mut self, frames: usize, channels: usize) {
        self.frames = frames;
        self.channels = channels;
        self.data.clear();
        self.data.resize(frames * channels, 0.0);
    }

    /// Copies the overlapping channels of `other` into this block without
    /// changing its dimensions. Frames beyond `other` are left untouched.
    pub fn copy_channels_from(&mut self, other: &Waveform) {
        let frames = self.frames.min(other.frames);
        let channels = self.channels.min(other.channels);
        for frame in 0..frames {
            for channel in 0..channels {
                *self.value_mut(frame, channel) = other.value(frame, channel);
            }
        }
    }
}

/// Block of spectral bins stored channel after channel, `bins` x `channels`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    bins: usize,
    channels: usize,
    data: Vec<Complex32>,
}

impl Spectrum {
    pub fn new(bins: usize, channels: usize) -> Self {
        Self {
            bins,
            channels,
            data: vec![Complex32::new(0.0, 0.0); bins * channels],
        }
    }

    pub fn for_format(format: &SignalFormat) -> Self {
        Self::new(format.bins(), format.channels as usize)
    }

    pub fn from_channels(bins: usize, data: Vec<Complex32>) -> Option<Self> {
        if bins == 0 || data.len() % bins != 0 {
            return None;
        }
        Some(Self {
            bins,
            channels: data.len() / bins,
            data,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn value(&self, bin: usize, channel: usize) -> Complex32 {
        self.data[channel * self.bins + bin]
    }

    pub fn value_mut(&mut self, bin: usize, channel: usize) -> &mut Complex32 {
        &mut self.data[channel * self.bins + bin]
    }

    pub fn channel(&self, channel: usize) -> &[Complex32] {
        let start = channel * self.bins;
        &self.data[start..start + self.bins]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [Complex32] {
        let start = channel * self.bins;
        &mut self.data[start..start + self.bins]
    }

    pub fn as_slice(&self) -> &[Complex32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex32] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(Complex32::new(0.0, 0.0));
    }
}

/// A mutable borrow of either kind of signal block, tagged by domain.
#[derive(Debug)]
pub enum SignalMut<'a> {
    Wave(&'a mut Waveform),
    Spec(&'a mut Spectrum),
}

impl<'a> SignalMut<'a> {
    pub fn domain(&self) -> crate::Domain {
        match self {
            SignalMut::Wave(_) => crate::Domain::Waveform,
            SignalMut::Spec(_) => crate::Domain::Spectrum,
        }
    }

    pub fn into_wave(self) -> Option<&'a mut Waveform> {
        match self {
            SignalMut::Wave(wave) => Some(wave),
            SignalMut::Spec(_) => None,
        }
    }

    pub fn into_spec(self) -> Option<&'a mut Spectrum> {
        match self {
            SignalMut::Spec(spec) => Some(spec),
            SignalMut::Wave(_) => None,
        }
    }
}
