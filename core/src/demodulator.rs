use crate::block::{AudioBlock, BlockSource, IterSource};
use crate::config::ModemConfig;
use crate::error::{ModemError, Result};
use crate::marker::{MarkerMatcher, MatchStep};
use crate::spectrum::SpectralClassifier;
use crate::tones::{bits_to_bytes, BitToneMap};

/// What to do when the source runs out before a complete frame was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Return whatever complete bytes were decoded (possibly none)
    #[default]
    Lenient,
    /// Report `NoStartMarkerFound` / `TruncatedFrame`
    Strict,
}

/// How the end of a frame is recognised
///
/// Start detection always uses an ordered [`MarkerMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndPolicy {
    /// The full END sequence must match in order
    #[default]
    Ordered,
    /// Any symbol close to any END tone ends the frame
    AnyOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Searching,
    Receiving,
    Complete,
}

/// Result of pushing one symbol into a [`FrameReceiver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Still waiting for the start marker; symbol discarded
    Searching,
    /// Symbol completed the start marker
    FrameStarted,
    /// Symbol (and any held-back ones) recorded as payload bits
    Payload,
    /// Symbol held back as a possible END marker symbol
    Pending,
    /// Symbol completed the end marker
    FrameEnded,
    /// Frame already complete; symbol ignored
    Ignored,
}

/// Per-symbol framing state machine
///
/// Feed it one classified frequency per block. Symbols before the start marker and
/// the marker symbols themselves never become payload bits.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    start: MarkerMatcher,
    end: MarkerMatcher,
    end_policy: EndPolicy,
    tones: BitToneMap,
    phase: Phase,
    bits: Vec<bool>,
    pending: Vec<f32>,
}

impl FrameReceiver {
    pub fn new(config: &ModemConfig, end_policy: EndPolicy) -> Self {
        Self {
            start: MarkerMatcher::new(config.start_marker.clone(), config.tolerance_hz),
            end: MarkerMatcher::new(config.end_marker.clone(), config.tolerance_hz),
            end_policy,
            tones: config.bit_tones(),
            phase: Phase::Searching,
            bits: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, frequency: f32) -> ReceiverEvent {
        match self.phase {
            Phase::Searching => {
                if self.start.step(frequency) == MatchStep::Matched {
                    log::debug!("start marker matched");
                    self.phase = Phase::Receiving;
                    ReceiverEvent::FrameStarted
                } else {
                    ReceiverEvent::Searching
                }
            }
            Phase::Receiving => match self.end_policy {
                EndPolicy::AnyOf => {
                    if self.end.contains(frequency) {
                        self.complete()
                    } else {
                        self.bits.push(self.tones.classify(frequency));
                        ReceiverEvent::Payload
                    }
                }
                EndPolicy::Ordered => match self.end.step(frequency) {
                    MatchStep::Continue => {
                        self.pending.push(frequency);
                        ReceiverEvent::Pending
                    }
                    MatchStep::Matched => {
                        self.pending.clear();
                        self.complete()
                    }
                    MatchStep::Reset => {
                        for held in self.pending.drain(..) {
                            self.bits.push(self.tones.classify(held));
                        }
                        self.bits.push(self.tones.classify(frequency));
                        ReceiverEvent::Payload
                    }
                },
            },
            Phase::Complete => ReceiverEvent::Ignored,
        }
    }

    fn complete(&mut self) -> ReceiverEvent {
        log::debug!("end marker matched after {} payload bits", self.bits.len());
        self.phase = Phase::Complete;
        ReceiverEvent::FrameEnded
    }

    pub fn is_synchronized(&self) -> bool {
        self.phase != Phase::Searching
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Payload bits collected so far (held-back END candidates excluded)
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Complete bytes collected so far
    pub fn bytes(&self) -> Vec<u8> {
        bits_to_bytes(&self.bits)
    }

    /// Back to searching for a start marker, dropping all collected state
    pub fn reset(&mut self) {
        self.start.reset();
        self.end.reset();
        self.phase = Phase::Searching;
        self.bits.clear();
        self.pending.clear();
    }

    /// Close out the frame once no more symbols will arrive
    pub fn finish(&self, mode: DecodeMode) -> Result<Vec<u8>> {
        match (self.phase, mode) {
            (Phase::Complete, _) => Ok(self.bytes()),
            (Phase::Searching, DecodeMode::Lenient) => {
                log::debug!("source exhausted before start marker");
                Ok(Vec::new())
            }
            (Phase::Searching, DecodeMode::Strict) => Err(ModemError::NoStartMarkerFound),
            (Phase::Receiving, mode) => {
                if !self.pending.is_empty() {
                    log::debug!(
                        "discarding {} symbols of an incomplete end marker",
                        self.pending.len()
                    );
                }
                let decoded = self.bytes();
                log::debug!(
                    "source exhausted mid-frame: {} bits, {} complete bytes",
                    self.bits.len(),
                    decoded.len()
                );
                match mode {
                    DecodeMode::Lenient => Ok(decoded),
                    DecodeMode::Strict => Err(ModemError::TruncatedFrame { decoded }),
                }
            }
        }
    }
}

/// Binary FSK demodulator
///
/// Single forward pass: classify each block, synchronise on START, collect bits until
/// END. No checksum is carried, so a misclassified symbol silently flips one bit.
pub struct Demodulator {
    config: ModemConfig,
    classifier: SpectralClassifier,
    mode: DecodeMode,
    end_policy: EndPolicy,
}

impl Demodulator {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        config.warn_issues();
        Ok(Self::build(config))
    }

    fn build(config: ModemConfig) -> Self {
        Self {
            classifier: SpectralClassifier::new(config.sample_rate),
            config,
            mode: DecodeMode::default(),
            end_policy: EndPolicy::default(),
        }
    }

    pub fn with_mode(mut self, mode: DecodeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_end_policy(mut self, end_policy: EndPolicy) -> Self {
        self.end_policy = end_policy;
        self
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn end_policy(&self) -> EndPolicy {
        self.end_policy
    }

    /// Fresh framing state machine for this demodulator's configuration
    pub fn receiver(&self) -> FrameReceiver {
        FrameReceiver::new(&self.config, self.end_policy)
    }

    /// Dominant frequency of one block
    pub fn classify(&mut self, block: &AudioBlock) -> f32 {
        self.classifier.classify(block)
    }

    pub fn decode<I>(&mut self, blocks: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = AudioBlock>,
    {
        self.decode_source(&mut IterSource::new(blocks.into_iter()))
    }

    /// Decode one frame, reading no further than its end marker
    pub fn decode_source<S: BlockSource + ?Sized>(&mut self, source: &mut S) -> Result<Vec<u8>> {
        let mut receiver = self.receiver();
        let mut symbols = 0usize;

        while let Some(block) = source.next_block()? {
            let frequency = self.classifier.classify(&block);
            symbols += 1;
            let event = receiver.push(frequency);
            log::trace!("symbol {}: {} Hz -> {:?}", symbols, frequency, event);
            if event == ReceiverEvent::FrameEnded {
                break;
            }
        }

        receiver.finish(self.mode)
    }

    /// Decode a flat sample buffer, split into symbol-length blocks
    pub fn decode_samples(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        let block_len = self.config.samples_per_symbol();
        let blocks: Vec<AudioBlock> = samples
            .chunks_exact(block_len)
            .map(|chunk| AudioBlock::new(chunk.to_vec()))
            .collect();
        self.decode(blocks)
    }
}

impl Default for Demodulator {
    fn default() -> Self {
        Self::build(ModemConfig::default())
    }
}
