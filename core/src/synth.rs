use crate::block::AudioBlock;
use std::f64::consts::PI;

/// Generate a pure sine tone block
///
/// Sample `i` is `round(amplitude * sin(2π * frequency * i / sample_rate))`. Output is
/// bit-identical for identical inputs, which the round-trip tests depend on.
pub fn synthesize(frequency: f32, sample_count: usize, sample_rate: u32, amplitude: i16) -> AudioBlock {
    let angular_freq = 2.0 * PI * frequency as f64 / sample_rate as f64;
    let amplitude = amplitude as f64;

    let samples = (0..sample_count)
        .map(|i| (amplitude * (angular_freq * i as f64).sin()).round() as i16)
        .collect();

    AudioBlock::new(samples)
}
