//! Protocol configuration
//!
//! [`ModemConfig::default`] is the reference tone table. Both ends of a link must use
//! the same configuration; nothing about it is transmitted.

use crate::error::{ModemError, Result};
use crate::tones::BitToneMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Samples per second
    pub sample_rate: u32,
    /// Length of one symbol in seconds
    pub symbol_duration_secs: f64,
    /// Tone for bit 1 (Hz)
    pub freq_one: f32,
    /// Tone for bit 0 (Hz)
    pub freq_zero: f32,
    /// Ordered frame start marker (Hz)
    pub start_marker: Vec<f32>,
    /// Ordered frame end marker (Hz)
    pub end_marker: Vec<f32>,
    /// Two frequencies are equal when they differ by strictly less than this (Hz)
    pub tolerance_hz: f32,
    /// Peak sample magnitude of synthesized tones
    pub amplitude: i16,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::SAMPLE_RATE,
            symbol_duration_secs: crate::SYMBOL_DURATION_SECS,
            freq_one: crate::FREQ_ONE,
            freq_zero: crate::FREQ_ZERO,
            start_marker: crate::START_MARKER_FREQS.to_vec(),
            end_marker: crate::END_MARKER_FREQS.to_vec(),
            tolerance_hz: crate::TOLERANCE_HZ,
            amplitude: crate::AMPLITUDE,
        }
    }
}

impl ModemConfig {
    pub fn samples_per_symbol(&self) -> usize {
        (self.sample_rate as f64 * self.symbol_duration_secs).round() as usize
    }

    pub fn symbol_duration(&self) -> Duration {
        Duration::from_secs_f64(self.symbol_duration_secs.max(0.0))
    }

    /// Spectral classifier bin width in Hz
    pub fn resolution_hz(&self) -> f32 {
        self.sample_rate as f32 / self.samples_per_symbol().max(1) as f32
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn bit_tones(&self) -> BitToneMap {
        BitToneMap::new(self.freq_one, self.freq_zero)
    }

    /// Reject configurations the modem cannot run with at all
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        if !self.symbol_duration_secs.is_finite() || self.symbol_duration_secs <= 0.0 {
            return Err(invalid("symbol_duration_secs must be positive"));
        }
        if self.samples_per_symbol() == 0 {
            return Err(invalid("symbol duration is shorter than one sample"));
        }
        if !self.tolerance_hz.is_finite() || self.tolerance_hz <= 0.0 {
            return Err(invalid("tolerance_hz must be positive"));
        }
        if self.amplitude <= 0 {
            return Err(invalid("amplitude must be positive"));
        }
        if self.start_marker.is_empty() {
            return Err(invalid("start_marker must not be empty"));
        }
        if self.end_marker.is_empty() {
            return Err(invalid("end_marker must not be empty"));
        }

        let nyquist = self.nyquist_hz();
        for &freq in self.alphabet().iter() {
            if !freq.is_finite() || freq <= 0.0 || freq >= nyquist {
                return Err(invalid(&format!(
                    "tone {} Hz is outside (0, {}) Hz",
                    freq, nyquist
                )));
            }
        }

        Ok(())
    }

    /// Report protocol invariants this configuration violates
    ///
    /// None of these stop the modem from running, they make misclassification or
    /// spurious marker matches more likely. The reference table itself triggers some.
    pub fn audit(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let tol = self.tolerance_hz;

        let bit_spacing = (self.freq_one - self.freq_zero).abs();
        if bit_spacing <= 2.0 * tol {
            issues.push(ConfigIssue::BitTonesTooClose {
                spacing: bit_spacing,
                tolerance: tol,
            });
        }

        for (kind, marker) in [
            (MarkerKind::Start, &self.start_marker),
            (MarkerKind::End, &self.end_marker),
        ] {
            for &frequency in dedup(marker).iter() {
                for bit_tone in [self.freq_one, self.freq_zero] {
                    if (frequency - bit_tone).abs() <= tol {
                        issues.push(ConfigIssue::MarkerOverlapsBitTone {
                            marker: kind,
                            frequency,
                            bit_tone,
                        });
                    }
                }
            }
        }

        let alphabet = dedup(&self.alphabet());
        let min_spacing = alphabet
            .iter()
            .enumerate()
            .flat_map(|(i, a)| alphabet[i + 1..].iter().map(move |b| (a - b).abs()))
            .fold(f32::INFINITY, f32::min);
        if min_spacing.is_finite() && tol >= min_spacing / 2.0 {
            issues.push(ConfigIssue::ToleranceTooWide {
                tolerance: tol,
                min_spacing,
            });
        }

        let markers = [
            (MarkerKind::Start, &self.start_marker),
            (MarkerKind::End, &self.end_marker),
        ];
        for (from_kind, from) in markers {
            for (to_kind, to) in markers {
                let max_len = if from_kind == to_kind {
                    from.len().saturating_sub(1)
                } else {
                    from.len().min(to.len())
                };
                if let Some(overlap) = suffix_prefix_overlap(from, to, max_len, tol) {
                    issues.push(ConfigIssue::MarkerOverlap {
                        from: from_kind,
                        to: to_kind,
                        overlap,
                    });
                }
            }
        }

        let resolution = self.resolution_hz();
        if tol < resolution {
            issues.push(ConfigIssue::ToleranceBelowResolution {
                tolerance: tol,
                resolution,
            });
        }

        issues
    }

    pub(crate) fn warn_issues(&self) {
        for issue in self.audit() {
            log::warn!("config: {}", issue);
        }
    }

    fn alphabet(&self) -> Vec<f32> {
        let mut tones = vec![self.freq_one, self.freq_zero];
        tones.extend_from_slice(&self.start_marker);
        tones.extend_from_slice(&self.end_marker);
        tones
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Start => write!(f, "start"),
            MarkerKind::End => write!(f, "end"),
        }
    }
}

/// A soft protocol invariant violation found by [`ModemConfig::audit`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    /// Bit tones are not separated by more than twice the tolerance
    BitTonesTooClose { spacing: f32, tolerance: f32 },
    /// A marker tone is within the tolerance of a bit tone
    MarkerOverlapsBitTone {
        marker: MarkerKind,
        frequency: f32,
        bit_tone: f32,
    },
    /// Tolerance is not below half the smallest spacing between distinct tones
    ToleranceTooWide { tolerance: f32, min_spacing: f32 },
    /// A proper suffix of `from` equals a prefix of `to`
    MarkerOverlap {
        from: MarkerKind,
        to: MarkerKind,
        overlap: usize,
    },
    /// Tolerance is finer than the classifier can resolve
    ToleranceBelowResolution { tolerance: f32, resolution: f32 },
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::BitTonesTooClose { spacing, tolerance } => write!(
                f,
                "bit tones are {} Hz apart, need more than {} Hz (2 x tolerance)",
                spacing,
                2.0 * tolerance
            ),
            ConfigIssue::MarkerOverlapsBitTone {
                marker,
                frequency,
                bit_tone,
            } => write!(
                f,
                "{} marker tone {} Hz is within tolerance of bit tone {} Hz",
                marker, frequency, bit_tone
            ),
            ConfigIssue::ToleranceTooWide {
                tolerance,
                min_spacing,
            } => write!(
                f,
                "tolerance {} Hz is not below half the minimum tone spacing of {} Hz",
                tolerance, min_spacing
            ),
            ConfigIssue::MarkerOverlap { from, to, overlap } => write!(
                f,
                "last {} tones of the {} marker equal the first {} tones of the {} marker",
                overlap, from, overlap, to
            ),
            ConfigIssue::ToleranceBelowResolution {
                tolerance,
                resolution,
            } => write!(
                f,
                "tolerance {} Hz is finer than the {} Hz classifier resolution",
                tolerance, resolution
            ),
        }
    }
}

fn invalid(msg: &str) -> ModemError {
    ModemError::InvalidConfig(msg.to_string())
}

fn dedup(tones: &[f32]) -> Vec<f32> {
    let mut out: Vec<f32> = Vec::with_capacity(tones.len());
    for &tone in tones {
        if !out.contains(&tone) {
            out.push(tone);
        }
    }
    out
}

/// Longest suffix of `from`, at most `max_len` long, equal (within `tol`) to a prefix of `to`
fn suffix_prefix_overlap(from: &[f32], to: &[f32], max_len: usize, tol: f32) -> Option<usize> {
    let max_len = max_len.min(from.len()).min(to.len());
    (1..=max_len)
        .rev()
        .find(|&len| {
            let suffix = &from[from.len() - len..];
            let prefix = &to[..len];
            suffix
                .iter()
                .zip(prefix.iter())
                .all(|(a, b)| (a - b).abs() < tol)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_constants() {
        let config = ModemConfig::default();
        assert_eq!(config.samples_per_symbol(), crate::SAMPLES_PER_SYMBOL);
        assert_eq!(config.resolution_hz(), 100.0);
        assert_eq!(config.symbol_duration(), Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reference_table_audit() {
        let issues = ModemConfig::default().audit();

        assert!(issues
            .iter()
            .any(|i| matches!(i, ConfigIssue::BitTonesTooClose { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ConfigIssue::ToleranceTooWide { min_spacing, .. } if *min_spacing == 500.0)));
        // START repeats with period 4
        assert!(issues.contains(&ConfigIssue::MarkerOverlap {
            from: MarkerKind::Start,
            to: MarkerKind::Start,
            overlap: 4,
        }));
        // END's first tone sits exactly 500 Hz above FREQ_ZERO
        assert!(issues.contains(&ConfigIssue::MarkerOverlapsBitTone {
            marker: MarkerKind::End,
            frequency: 20000.0,
            bit_tone: 19500.0,
        }));
        assert!(!issues
            .iter()
            .any(|i| matches!(i, ConfigIssue::ToleranceBelowResolution { .. })));
    }

    #[test]
    fn test_well_spaced_table_has_no_issues() {
        let config = ModemConfig {
            freq_one: 4000.0,
            freq_zero: 6000.0,
            start_marker: vec![8000.0, 10000.0, 12000.0],
            end_marker: vec![14000.0, 16000.0, 18000.0],
            tolerance_hz: 400.0,
            ..ModemConfig::default()
        };
        assert!(config.audit().is_empty(), "{:?}", config.audit());
    }

    #[test]
    fn test_validate_rejects_tone_above_nyquist() {
        let config = ModemConfig {
            freq_zero: 23000.0,
            ..ModemConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ModemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_marker() {
        let config = ModemConfig {
            end_marker: Vec::new(),
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let config = ModemConfig {
            symbol_duration_secs: 0.0,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: ModemConfig = serde_json::from_str(r#"{"freq_zero": 20000.0}"#).unwrap();
        assert_eq!(config.freq_zero, crate::LEGACY_FREQ_ZERO);
        assert_eq!(config.freq_one, crate::FREQ_ONE);
        assert_eq!(config.start_marker, crate::START_MARKER_FREQS.to_vec());
    }

    #[test]
    fn test_suffix_prefix_overlap() {
        let marker = [1.0, 2.0, 1.0];
        assert_eq!(suffix_prefix_overlap(&marker, &marker, 2, 0.5), Some(1));
        assert_eq!(suffix_prefix_overlap(&marker, &marker, 3, 0.5), Some(3));
        assert_eq!(suffix_prefix_overlap(&[1.0, 2.0], &[3.0, 4.0], 2, 0.5), None);
        assert_eq!(suffix_prefix_overlap(&[5.0, 1.0, 2.0], &[1.0, 2.0, 9.0], 3, 0.5), Some(2));
    }
}
