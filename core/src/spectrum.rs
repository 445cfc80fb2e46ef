use crate::block::AudioBlock;
use rustfft::{num_complex::Complex, FftPlanner};

/// Dominant-frequency estimator for single-tone blocks
///
/// Takes the full complex DFT of the block, picks the bin with the largest magnitude
/// (first one on ties) and folds negative-frequency bins onto positive ones.
/// Resolution is `sample_rate / block.len()`. An all-zero block reports 0 Hz.
pub struct SpectralClassifier {
    sample_rate: u32,
    fft_planner: FftPlanner<f32>,
    buffer: Vec<Complex<f32>>,
}

impl SpectralClassifier {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fft_planner: FftPlanner::new(),
            buffer: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Dominant frequency of `block` in Hz
    pub fn classify(&mut self, block: &AudioBlock) -> f32 {
        let n = block.len();
        if n == 0 {
            return 0.0;
        }

        self.buffer.clear();
        self.buffer
            .extend(block.samples().iter().map(|&s| Complex::new(s as f32, 0.0)));

        // Planner caches plans per length
        let fft = self.fft_planner.plan_fft_forward(n);
        fft.process(&mut self.buffer);

        let mut peak_bin = 0;
        let mut peak_power = f32::NEG_INFINITY;
        for (bin, value) in self.buffer.iter().enumerate() {
            let power = value.norm_sqr();
            if power > peak_power {
                peak_power = power;
                peak_bin = bin;
            }
        }

        bin_frequency(peak_bin, n, self.sample_rate)
    }
}

/// Absolute frequency of DFT bin `bin` for an `n`-point transform
///
/// Bins above `(n - 1) / 2` are negative frequencies `(bin - n) * rate / n`.
pub fn bin_frequency(bin: usize, n: usize, sample_rate: u32) -> f32 {
    let signed = if bin <= (n - 1) / 2 {
        bin as i64
    } else {
        bin as i64 - n as i64
    };
    (signed.unsigned_abs() as f64 * sample_rate as f64 / n as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::synthesize;
    use crate::{AMPLITUDE, END_MARKER_FREQS, SAMPLES_PER_SYMBOL, SAMPLE_RATE, START_MARKER_FREQS};

    fn tone(freq: f32, n: usize) -> AudioBlock {
        synthesize(freq, n, SAMPLE_RATE, AMPLITUDE)
    }

    #[test]
    fn test_bin_frequency_folds_negative_bins() {
        assert_eq!(bin_frequency(0, 441, 44100), 0.0);
        assert_eq!(bin_frequency(190, 441, 44100), 19000.0);
        assert_eq!(bin_frequency(441 - 190, 441, 44100), 19000.0);
        // Even length: bin n/2 is the (negative) Nyquist bin
        assert_eq!(bin_frequency(4, 8, 8000), 4000.0);
        assert_eq!(bin_frequency(5, 8, 8000), 3000.0);
    }

    #[test]
    fn test_classify_reference_alphabet_exactly() {
        let mut classifier = SpectralClassifier::new(SAMPLE_RATE);
        let mut alphabet = vec![crate::FREQ_ONE, crate::FREQ_ZERO];
        alphabet.extend_from_slice(&START_MARKER_FREQS);
        alphabet.extend_from_slice(&END_MARKER_FREQS);

        for freq in alphabet {
            let detected = classifier.classify(&tone(freq, SAMPLES_PER_SYMBOL));
            assert_eq!(detected, freq, "tone {} Hz classified as {} Hz", freq, detected);
        }
    }

    #[test]
    fn test_classify_off_bin_tones_within_half_resolution() {
        let mut classifier = SpectralClassifier::new(SAMPLE_RATE);
        let half_resolution = SAMPLE_RATE as f32 / SAMPLES_PER_SYMBOL as f32 / 2.0;

        for freq in [523.0, 1234.0, 8765.0, 12345.0, 18020.0, 21010.0] {
            let detected = classifier.classify(&tone(freq, SAMPLES_PER_SYMBOL));
            assert!(
                (detected - freq).abs() <= half_resolution,
                "tone {} Hz classified as {} Hz",
                freq,
                detected
            );
        }
    }

    #[test]
    fn test_classify_other_block_lengths() {
        let mut classifier = SpectralClassifier::new(SAMPLE_RATE);
        let detected = classifier.classify(&tone(17000.0, 1024));
        let half_resolution = SAMPLE_RATE as f32 / 1024.0 / 2.0;
        assert!((detected - 17000.0).abs() <= half_resolution);

        // Back to the symbol length with a cached planner
        assert_eq!(classifier.classify(&tone(15500.0, SAMPLES_PER_SYMBOL)), 15500.0);
    }

    #[test]
    fn test_classify_silence_reports_dc() {
        let mut classifier = SpectralClassifier::new(SAMPLE_RATE);
        let silent = AudioBlock::new(vec![0; SAMPLES_PER_SYMBOL]);
        assert_eq!(classifier.classify(&silent), 0.0);
    }

    #[test]
    fn test_classify_empty_block() {
        let mut classifier = SpectralClassifier::new(SAMPLE_RATE);
        assert_eq!(classifier.classify(&AudioBlock::new(Vec::new())), 0.0);
    }
}
