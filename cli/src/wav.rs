//! WAV file shell around the modem's block stream

use fskwave_core::resample::{downmix_to_mono, resample_linear};
use fskwave_core::{AudioBlock, BlockSink, BlockSource, ModemConfig, ModemError};
use hound::{SampleFormat, WavIntoSamples, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV error: {0}")]
    Hound(#[from] hound::Error),

    #[error("Unsupported WAV format: {bits}-bit {format:?}")]
    UnsupportedFormat { bits: u16, format: SampleFormat },
}

fn modem_error(err: hound::Error) -> ModemError {
    match err {
        hound::Error::IoError(e) => ModemError::Io(e),
        other => ModemError::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
    }
}

/// Samples of any supported encoding, converted to i16
enum SampleStream<R: Read> {
    Int16(WavIntoSamples<R, i16>),
    Int32 { samples: WavIntoSamples<R, i32>, shift: u16 },
    Float(WavIntoSamples<R, f32>),
}

impl<R: Read> SampleStream<R> {
    fn check(spec: WavSpec) -> Result<(), WavError> {
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 1..=32) | (SampleFormat::Float, 32) => Ok(()),
            (format, bits) => Err(WavError::UnsupportedFormat { bits, format }),
        }
    }

    fn new(reader: WavReader<R>) -> Result<Self, WavError> {
        let spec = reader.spec();
        Self::check(spec)?;
        Ok(match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 1..=16) => Self::Int16(reader.into_samples()),
            (SampleFormat::Int, _) => Self::Int32 {
                samples: reader.into_samples(),
                shift: spec.bits_per_sample - 16,
            },
            _ => Self::Float(reader.into_samples()),
        })
    }

    fn next_sample(&mut self) -> Option<hound::Result<i16>> {
        match self {
            Self::Int16(samples) => samples.next(),
            Self::Int32 { samples, shift } => {
                let shift = *shift;
                samples.next().map(|r| r.map(|s| (s >> shift) as i16))
            }
            Self::Float(samples) => samples.next().map(|r| {
                r.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            }),
        }
    }
}

enum Feed<R: Read> {
    /// Sample rate already matches: read a block at a time
    Streaming { stream: SampleStream<R>, channels: u16 },
    /// Resampled up front
    Buffered(std::vec::IntoIter<i16>),
}

/// Reads a WAV recording as symbol-length mono blocks at the modem's sample rate
///
/// A trailing partial block is dropped.
pub struct WavBlockSource<R: Read> {
    feed: Feed<R>,
    block_len: usize,
    spec: WavSpec,
}

impl WavBlockSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, config: &ModemConfig) -> Result<Self, WavError> {
        Self::new(WavReader::open(path)?, config)
    }
}

impl<R: Read> WavBlockSource<R> {
    pub fn new(reader: WavReader<R>, config: &ModemConfig) -> Result<Self, WavError> {
        let spec = reader.spec();
        let mut stream = SampleStream::new(reader)?;

        let feed = if spec.sample_rate == config.sample_rate {
            Feed::Streaming {
                stream,
                channels: spec.channels.max(1),
            }
        } else {
            log::info!(
                "resampling {} Hz recording to {} Hz",
                spec.sample_rate,
                config.sample_rate
            );
            let mut interleaved = Vec::new();
            while let Some(sample) = stream.next_sample() {
                interleaved.push(sample?);
            }
            let mono = downmix_to_mono(&interleaved, spec.channels);
            let resampled = resample_linear(&mono, spec.sample_rate, config.sample_rate);
            Feed::Buffered(resampled.into_iter())
        };

        Ok(Self {
            feed,
            block_len: config.samples_per_symbol(),
            spec,
        })
    }

    /// Format of the underlying file
    pub fn spec(&self) -> WavSpec {
        self.spec
    }
}

impl<R: Read> BlockSource for WavBlockSource<R> {
    fn next_block(&mut self) -> fskwave_core::Result<Option<AudioBlock>> {
        let samples = match &mut self.feed {
            Feed::Streaming { stream, channels } => {
                let wanted = self.block_len * *channels as usize;
                let mut interleaved = Vec::with_capacity(wanted);
                while interleaved.len() < wanted {
                    match stream.next_sample() {
                        Some(sample) => interleaved.push(sample.map_err(modem_error)?),
                        None => break,
                    }
                }
                downmix_to_mono(&interleaved, *channels)
            }
            Feed::Buffered(samples) => samples.by_ref().take(self.block_len).collect(),
        };

        if samples.len() < self.block_len {
            if !samples.is_empty() {
                log::debug!("dropping trailing partial block of {} samples", samples.len());
            }
            return Ok(None);
        }
        Ok(Some(AudioBlock::new(samples)))
    }
}

/// Writes blocks as a mono 16-bit WAV file
pub struct WavBlockSink<W: Write + Seek> {
    writer: WavWriter<W>,
}

pub fn mono_spec(config: &ModemConfig) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

impl WavBlockSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, config: &ModemConfig) -> Result<Self, WavError> {
        let file = File::create(path).map_err(hound::Error::IoError)?;
        Self::new(BufWriter::new(file), config)
    }
}

impl<W: Write + Seek> WavBlockSink<W> {
    pub fn new(writer: W, config: &ModemConfig) -> Result<Self, WavError> {
        Ok(Self {
            writer: WavWriter::new(writer, mono_spec(config))?,
        })
    }

    /// Patch the header and close the file
    pub fn finalize(self) -> Result<(), WavError> {
        self.writer.finalize()?;
        Ok(())
    }
}

impl<W: Write + Seek> BlockSink for WavBlockSink<W> {
    fn write_block(&mut self, block: &AudioBlock) -> fskwave_core::Result<()> {
        for &sample in block.samples() {
            self.writer.write_sample(sample).map_err(modem_error)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> fskwave_core::Result<()> {
        self.writer.flush().map_err(modem_error)
    }
}
