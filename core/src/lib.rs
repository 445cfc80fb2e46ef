//! Acoustic modem library: binary FSK over ultrasonic tones
//!
//! Payload bits are sent as one fixed-length tone block each, framed by ordered
//! START/END marker tone sequences. There is no error correction: a misclassified
//! symbol silently flips one bit.

pub mod block;
pub mod config;
pub mod demodulator;
pub mod error;
pub mod marker;
pub mod modulator;
pub mod realtime;
pub mod resample;
pub mod spectrum;
pub mod synth;
pub mod tones;

pub use block::{AudioBlock, BlockSink, BlockSource, PcmReader, PcmWriter};
pub use config::{ConfigIssue, ModemConfig};
pub use demodulator::{DecodeMode, Demodulator, EndPolicy, FrameReceiver, ReceiverEvent};
pub use error::{ModemError, Result};
pub use marker::{MarkerMatcher, MatchStep};
pub use modulator::{Encode, Modulator, Pacing};
pub use realtime::{
    CaptureDevice, CaptureSession, Gate, GateHandle, GateSignal, PlaybackDevice,
    PlaybackSession, RealtimeDecoder, SharedGate, SyncStrategy, Ungated,
};
pub use spectrum::SpectralClassifier;
pub use synth::synthesize;
pub use tones::BitToneMap;

// Sampling configuration
pub const SAMPLE_RATE: u32 = 44100;
pub const SYMBOL_DURATION_SECS: f64 = 0.01;
pub const SAMPLES_PER_SYMBOL: usize = 441; // round(44100 * 0.01)

// Bit tones
pub const FREQ_ONE: f32 = 19000.0; // Hz
pub const FREQ_ZERO: f32 = 19500.0; // Hz
/// FREQ_ZERO used by the earliest tone table. Not interoperable with [`FREQ_ZERO`].
pub const LEGACY_FREQ_ZERO: f32 = 20000.0; // Hz

// Frame markers
pub const MARKER_LEN: usize = 8;
pub const START_MARKER_FREQS: [f32; MARKER_LEN] = [
    15000.0, 17000.0, 15500.0, 17500.0, 15000.0, 17000.0, 15500.0, 17500.0,
];
pub const END_MARKER_FREQS: [f32; MARKER_LEN] = [
    20000.0, 17000.0, 20000.0, 17500.0, 15000.0, 17000.0, 20000.0, 17500.0,
];

/// Equality window for bit and marker comparisons (strict `<`)
pub const TOLERANCE_HZ: f32 = 500.0;

/// Peak magnitude of every synthesized tone (max positive i16)
pub const AMPLITUDE: i16 = i16::MAX;
