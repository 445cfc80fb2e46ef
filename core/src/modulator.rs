use crate::block::{AudioBlock, BlockSink};
use crate::config::ModemConfig;
use crate::error::Result;
use crate::synth::synthesize;
use std::iter::FusedIterator;

/// How [`Modulator::transmit`] paces its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Write blocks as fast as the sink accepts them
    #[default]
    Immediate,
    /// Sleep one symbol duration after every block
    RealTime,
}

/// Pre-rendered block for every tone the frame can contain
struct ToneBank {
    one: AudioBlock,
    zero: AudioBlock,
    start: Vec<AudioBlock>,
    end: Vec<AudioBlock>,
}

impl ToneBank {
    fn render(config: &ModemConfig) -> Self {
        let n = config.samples_per_symbol();
        let render = |freq: f32| synthesize(freq, n, config.sample_rate, config.amplitude);
        Self {
            one: render(config.freq_one),
            zero: render(config.freq_zero),
            start: config.start_marker.iter().map(|&f| render(f)).collect(),
            end: config.end_marker.iter().map(|&f| render(f)).collect(),
        }
    }
}

/// Binary FSK modulator
///
/// A frame is the START marker, one tone block per payload bit (MSB first), then the
/// END marker. Encoding cannot fail for any byte payload, including an empty one.
pub struct Modulator {
    config: ModemConfig,
    tones: ToneBank,
}

impl Modulator {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        config.warn_issues();
        Ok(Self::build(config))
    }

    fn build(config: ModemConfig) -> Self {
        let tones = ToneBank::render(&config);
        Self { config, tones }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Lazily produce the frame's blocks in transmission order
    pub fn encode<'a>(&'a self, payload: &'a [u8]) -> Encode<'a> {
        let total = self.tones.start.len() + payload.len() * 8 + self.tones.end.len();
        Encode {
            tones: &self.tones,
            payload,
            position: 0,
            total,
        }
    }

    pub fn encode_to_vec(&self, payload: &[u8]) -> Vec<AudioBlock> {
        self.encode(payload).collect()
    }

    /// Whole frame as one contiguous sample buffer
    pub fn encode_samples(&self, payload: &[u8]) -> Vec<i16> {
        let blocks = self.encode(payload);
        let mut samples = Vec::with_capacity(blocks.len() * self.config.samples_per_symbol());
        for block in blocks {
            samples.extend_from_slice(block.samples());
        }
        samples
    }

    /// Stream a frame into `sink`, returning the number of blocks written
    pub fn transmit<S: BlockSink + ?Sized>(
        &self,
        payload: &[u8],
        sink: &mut S,
        pacing: Pacing,
    ) -> Result<usize> {
        let symbol_duration = self.config.symbol_duration();
        let mut written = 0;

        for block in self.encode(payload) {
            sink.write_block(&block)?;
            written += 1;
            if pacing == Pacing::RealTime {
                std::thread::sleep(symbol_duration);
            }
        }
        sink.flush()?;

        log::debug!(
            "transmitted {} bytes as {} blocks ({:?})",
            payload.len(),
            written,
            pacing
        );
        Ok(written)
    }
}

impl Default for Modulator {
    fn default() -> Self {
        Self::build(ModemConfig::default())
    }
}

/// Block iterator returned by [`Modulator::encode`]
pub struct Encode<'a> {
    tones: &'a ToneBank,
    payload: &'a [u8],
    position: usize,
    total: usize,
}

impl<'a> Encode<'a> {
    fn block_at(&self, position: usize) -> &'a AudioBlock {
        let tones = self.tones;
        let start_len = tones.start.len();
        let bit_count = self.payload.len() * 8;

        if position < start_len {
            &tones.start[position]
        } else if position < start_len + bit_count {
            let bit_idx = position - start_len;
            let byte = self.payload[bit_idx / 8];
            if (byte >> (7 - bit_idx % 8)) & 1 == 1 {
                &tones.one
            } else {
                &tones.zero
            }
        } else {
            &tones.end[position - start_len - bit_count]
        }
    }
}

impl Iterator for Encode<'_> {
    type Item = AudioBlock;

    fn next(&mut self) -> Option<AudioBlock> {
        if self.position >= self.total {
            return None;
        }
        let block = self.block_at(self.position).clone();
        self.position += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Encode<'_> {}

impl FusedIterator for Encode<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::SpectralClassifier;
    use crate::{END_MARKER_FREQS, FREQ_ONE, FREQ_ZERO, MARKER_LEN, SAMPLES_PER_SYMBOL, START_MARKER_FREQS};

    fn dominant_tones(blocks: &[AudioBlock]) -> Vec<f32> {
        let mut classifier = SpectralClassifier::new(crate::SAMPLE_RATE);
        blocks.iter().map(|b| classifier.classify(b)).collect()
    }

    #[test]
    fn test_encode_hi_block_count() {
        let modulator = Modulator::default();
        let encoded = modulator.encode(b"Hi");
        assert_eq!(encoded.len(), MARKER_LEN + 16 + MARKER_LEN);
        assert_eq!(encoded.count(), 32);
    }

    #[test]
    fn test_encode_frame_layout() {
        let modulator = Modulator::default();
        let blocks = modulator.encode_to_vec(&[0b1010_0000]);
        let tones = dominant_tones(&blocks);

        assert_eq!(&tones[..MARKER_LEN], &START_MARKER_FREQS);
        assert_eq!(
            &tones[MARKER_LEN..MARKER_LEN + 8],
            &[FREQ_ONE, FREQ_ZERO, FREQ_ONE, FREQ_ZERO, FREQ_ZERO, FREQ_ZERO, FREQ_ZERO, FREQ_ZERO]
        );
        assert_eq!(&tones[MARKER_LEN + 8..], &END_MARKER_FREQS);
    }

    #[test]
    fn test_encode_empty_payload_is_two_markers() {
        let modulator = Modulator::default();
        let tones = dominant_tones(&modulator.encode_to_vec(b""));
        assert_eq!(tones.len(), 2 * MARKER_LEN);
        assert_eq!(&tones[..MARKER_LEN], &START_MARKER_FREQS);
        assert_eq!(&tones[MARKER_LEN..], &END_MARKER_FREQS);
    }

    #[test]
    fn test_encode_is_restartable_and_deterministic() {
        let modulator = Modulator::default();
        let first = modulator.encode_to_vec(b"again");
        let second = modulator.encode_to_vec(b"again");
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_samples_is_concatenation() {
        let modulator = Modulator::default();
        let samples = modulator.encode_samples(b"x");
        assert_eq!(samples.len(), (2 * MARKER_LEN + 8) * SAMPLES_PER_SYMBOL);
        assert_eq!(&samples[..SAMPLES_PER_SYMBOL], modulator.encode(b"x").next().unwrap().samples());
    }

    #[test]
    fn test_size_hint_counts_down() {
        let modulator = Modulator::default();
        let mut encoded = modulator.encode(b"a");
        assert_eq!(encoded.size_hint(), (24, Some(24)));
        encoded.next();
        assert_eq!(encoded.len(), 23);
        let rest: Vec<_> = encoded.by_ref().collect();
        assert_eq!(rest.len(), 23);
        assert!(encoded.next().is_none());
    }

    #[test]
    fn test_transmit_writes_every_block() {
        let modulator = Modulator::default();
        let mut sink: Vec<AudioBlock> = Vec::new();
        let written = modulator.transmit(b"ok", &mut sink, Pacing::Immediate).unwrap();
        assert_eq!(written, 32);
        assert_eq!(sink, modulator.encode_to_vec(b"ok"));
    }

    #[test]
    fn test_transmit_real_time_paces_output() {
        let modulator = Modulator::default();
        let mut sink: Vec<AudioBlock> = Vec::new();
        let started = std::time::Instant::now();
        let written = modulator.transmit(b"", &mut sink, Pacing::RealTime).unwrap();
        // 16 blocks at 10 ms each
        assert_eq!(written, 16);
        assert!(started.elapsed() >= std::time::Duration::from_millis(160));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ModemConfig {
            sample_rate: 0,
            ..ModemConfig::default()
        };
        assert!(Modulator::new(config).is_err());
    }
}
