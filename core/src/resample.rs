//! PCM conversion for recordings that do not match the modem's format
//!
//! Linear interpolation only. Good enough for tones well below Nyquist, and the
//! classifier only needs the dominant bin.

/// Average interleaved channels into one
///
/// A trailing incomplete frame is dropped.
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Resample to `to_rate` by linear interpolation
///
/// # Example
/// ```
/// use fskwave_core::resample::resample_linear;
///
/// let at_48k = vec![0i16; 4800];
/// let at_44k = resample_linear(&at_48k, 48000, 44100);
/// assert_eq!(at_44k.len(), 4410);
/// ```
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_length =
        ((samples.len() as u64 * to_rate as u64 + from_rate as u64 - 1) / from_rate as u64) as usize;
    let mut resampled = Vec::with_capacity(new_length);

    for i in 0..new_length {
        let src_idx = i as f64 / ratio;
        let src_idx_floor = (src_idx.floor() as usize).min(samples.len() - 1);
        let src_idx_ceil = src_idx_floor + 1;
        let fraction = src_idx - src_idx_floor as f64;

        let interpolated = if src_idx_ceil < samples.len() {
            samples[src_idx_floor] as f64 * (1.0 - fraction) + samples[src_idx_ceil] as f64 * fraction
        } else {
            samples[src_idx_floor] as f64
        };

        resampled.push(interpolated.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }

    resampled
}
