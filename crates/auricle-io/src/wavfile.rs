use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use auricle_sdk::{Driver, DriverContext, DriverResult, ErrorCode, StreamEvents, Waveform};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{DriverError, ErrorSlot};
use crate::params::{Param, Params};

pub const NAME: &str = "wavfile";

/// Offline stream over a WAV file. `start` reads the input file block by
/// block, hands every block to the engine and writes the processed blocks
/// to the output file in the input's sample format, then reports the stream
/// as stopped before returning.
///
/// Parameters: `in`, `out`, `startsample`, `length` (frames per start, zero
/// for all), `strict_channel_match` and `strict_srate_match`. They are locked
/// from prepare until release.
pub struct WavFileDriver {
    fragsize: u32,
    srate: f32,
    events: Arc<dyn StreamEvents>,
    params: Params,
    session: Option<Session>,
    errors: ErrorSlot,
}

impl WavFileDriver {
    pub fn new(context: DriverContext) -> Self {
        let params = Params::default()
            .with("in", "Input sound file name", Param::Text(String::new()))
            .with("out", "Output sound file name", Param::Text(String::new()))
            .with("startsample", "First frame to be processed", Param::Count(0))
            .with(
                "length",
                "Number of frames processed by one start command, or zero for all",
                Param::Count(0),
            )
            .with(
                "strict_channel_match",
                "Require the same channel count in the engine and the sound file",
                Param::Flag(true),
            )
            .with(
                "strict_srate_match",
                "Require the same sampling rate in the engine and the sound file",
                Param::Flag(true),
            );
        Self {
            fragsize: context.fragsize,
            srate: context.srate,
            events: context.events,
            params,
            session: None,
            errors: ErrorSlot::default(),
        }
    }

    fn open(&self, in_channels: u32, out_channels: u32) -> Result<Session, DriverError> {
        let input = self.params.text("in");
        if input.is_empty() {
            return Err(DriverError::MissingInput);
        }
        let output = self.params.text("out");
        if output.is_empty() {
            return Err(DriverError::MissingOutput);
        }

        let mut reader = WavReader::open(input).map_err(|source| DriverError::OpenInput {
            path: Path::new(input).to_path_buf(),
            source,
        })?;
        let spec = reader.spec();
        if self.params.flag("strict_channel_match") && u32::from(spec.channels) != in_channels {
            return Err(DriverError::ChannelMismatch {
                found: spec.channels,
                required: in_channels,
            });
        }
        if self.params.flag("strict_srate_match") && spec.sample_rate as f32 != self.srate {
            return Err(DriverError::SrateMismatch {
                found: spec.sample_rate,
                required: self.srate,
            });
        }
        let start = self.params.count("startsample");
        if start > 0 {
            let start = u32::try_from(start).unwrap_or(u32::MAX);
            reader.seek(start).map_err(hound::Error::from)?;
        }

        let out_spec = WavSpec {
            channels: u16::try_from(out_channels).unwrap_or(u16::MAX),
            ..spec
        };
        let writer = WavWriter::create(output, out_spec).map_err(|source| {
            DriverError::OpenOutput {
                path: Path::new(output).to_path_buf(),
                source,
            }
        })?;

        let frames = self.fragsize as usize;
        Ok(Session {
            reader,
            writer: Some(writer),
            spec,
            out_channels: usize::from(out_spec.channels),
            file_block: Waveform::new(frames, usize::from(spec.channels)),
            input: Waveform::new(frames, in_channels as usize),
            output: Waveform::new(frames, out_channels as usize),
        })
    }

    /// Streams the file once. Returns the processing error that ended the
    /// stream early, if any.
    fn run(&mut self) -> Result<Option<ErrorCode>, DriverError> {
        let session = self
            .session
            .as_mut()
            .ok_or(DriverError::NotPrepared(NAME))?;
        let length = self.params.count("length");
        let frames = self.fragsize as usize;
        let mut total = 0u64;
        self.events.started();
        loop {
            let read = session.read_block()?;
            if read == 0 {
                break;
            }
            session.input.clear();
            session.input.copy_channels_from(&session.file_block);
            total += read as u64;
            if let Err(code) = self
                .events
                .process(&mut session.input, &mut session.output)
            {
                return Ok(Some(code));
            }
            session.write_frames(read)?;
            if read < frames || (length != 0 && total >= length) {
                break;
            }
        }
        tracing::debug!(frames = total, "wave file processed");
        Ok(None)
    }
}

impl Driver for WavFileDriver {
    fn prepare(&mut self, in_channels: u32, out_channels: u32) -> DriverResult {
        let session = self.open(in_channels, out_channels);
        self.session = Some(self.errors.check(session)?);
        self.params.set_locked(true);
        Ok(())
    }

    fn start(&mut self) -> DriverResult {
        if self.session.is_none() {
            return Err(self.errors.fail(DriverError::NotPrepared(NAME)));
        }
        match self.run() {
            Ok(None) => self.events.stopped(0, 0),
            Ok(Some(code)) => self.events.stopped(code.get(), 0),
            Err(err) => {
                let code = self.errors.fail(err);
                self.events.stopped(0, code.get());
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> DriverResult {
        Ok(())
    }

    fn release(&mut self) -> DriverResult {
        self.params.set_locked(false);
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let finished = session.finish();
        self.errors.check(finished)
    }

    fn parse(&mut self, command: &str) -> DriverResult<String> {
        let parsed = self.params.parse(command);
        self.errors.check(parsed)
    }

    fn describe_error(&self, code: ErrorCode) -> String {
        self.errors.describe(code)
    }
}

struct Session {
    reader: WavReader<BufReader<File>>,
    writer: Option<WavWriter<BufWriter<File>>>,
    spec: WavSpec,
    out_channels: usize,
    file_block: Waveform,
    input: Waveform,
    output: Waveform,
}

impl Session {
    /// Fills `file_block` with the next frames, zero padded. Returns the
    /// number of complete frames read.
    fn read_block(&mut self) -> Result<usize, DriverError> {
        self.file_block.clear();
        let channels = self.file_block.channels().max(1);
        let samples = self.file_block.as_mut_slice();
        let wanted = samples.len();
        let mut filled = 0;
        match self.spec.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    samples[filled] = sample?;
                    filled += 1;
                }
            }
            SampleFormat::Int => {
                let scale = int_scale(self.spec.bits_per_sample);
                for sample in self.reader.samples::<i32>().take(wanted) {
                    samples[filled] = sample? as f32 / scale;
                    filled += 1;
                }
            }
        }
        Ok(filled / channels)
    }

    fn write_frames(&mut self, frames: usize) -> Result<(), DriverError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let frames = frames.min(self.output.frames());
        let channels = self.out_channels;
        for frame in 0..frames {
            for channel in 0..channels {
                let sample = if channel < self.output.channels() {
                    self.output.value(frame, channel)
                } else {
                    0.0
                };
                match self.spec.sample_format {
                    SampleFormat::Float => writer.write_sample(sample)?,
                    SampleFormat::Int => {
                        let scale = int_scale(self.spec.bits_per_sample);
                        let clipped = (sample * scale).round().clamp(-scale, scale - 1.0);
                        writer.write_sample(clipped as i32)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(), DriverError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

fn int_scale(bits: u16) -> f32 {
    (1u64 << (bits.clamp(1, 32) - 1)) as f32
}
