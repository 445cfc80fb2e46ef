/// Outcome of feeding one symbol to a [`MarkerMatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStep {
    /// Symbol matched the next expected tone; more are needed
    Continue,
    /// Symbol did not match; progress is back to 0
    Reset,
    /// Symbol completed the sequence; progress is back to 0
    Matched,
}

/// Sequential matcher for one ordered marker sequence
///
/// A mismatching symbol resets progress without being re-checked against the first
/// tone, so a marker that starts right after a near-miss is only picked up from its
/// next occurrence.
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    sequence: Vec<f32>,
    tolerance: f32,
    idx: usize,
}

impl MarkerMatcher {
    pub fn new(sequence: Vec<f32>, tolerance: f32) -> Self {
        Self {
            sequence,
            tolerance,
            idx: 0,
        }
    }

    pub fn step(&mut self, frequency: f32) -> MatchStep {
        let Some(&expected) = self.sequence.get(self.idx) else {
            // Empty sequence never matches
            return MatchStep::Reset;
        };

        if (frequency - expected).abs() < self.tolerance {
            self.idx += 1;
            if self.idx == self.sequence.len() {
                self.idx = 0;
                MatchStep::Matched
            } else {
                MatchStep::Continue
            }
        } else {
            self.idx = 0;
            MatchStep::Reset
        }
    }

    /// Number of tones matched so far
    pub fn progress(&self) -> usize {
        self.idx
    }

    pub fn reset(&mut self) {
        self.idx = 0;
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence(&self) -> &[f32] {
        &self.sequence
    }

    /// Whether `frequency` is within tolerance of any tone of the sequence
    pub fn contains(&self, frequency: f32) -> bool {
        self.sequence
            .iter()
            .any(|&tone| (frequency - tone).abs() < self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{START_MARKER_FREQS, TOLERANCE_HZ};

    fn start_matcher() -> MarkerMatcher {
        MarkerMatcher::new(START_MARKER_FREQS.to_vec(), TOLERANCE_HZ)
    }

    #[test]
    fn test_matches_exactly_at_last_symbol() {
        let mut matcher = start_matcher();
        for (i, &freq) in START_MARKER_FREQS.iter().enumerate() {
            let step = matcher.step(freq);
            if i + 1 < START_MARKER_FREQS.len() {
                assert_eq!(step, MatchStep::Continue, "matched early at step {}", i + 1);
                assert_eq!(matcher.progress(), i + 1);
            } else {
                assert_eq!(step, MatchStep::Matched);
            }
        }
        assert_eq!(matcher.progress(), 0);
    }

    #[test]
    fn test_wrong_symbol_anywhere_resets() {
        for wrong_at in 0..START_MARKER_FREQS.len() {
            let mut matcher = start_matcher();
            for (i, &freq) in START_MARKER_FREQS.iter().enumerate() {
                if i == wrong_at {
                    assert_eq!(matcher.step(19000.0), MatchStep::Reset);
                    assert_eq!(matcher.progress(), 0);
                    break;
                }
                assert_eq!(matcher.step(freq), MatchStep::Continue);
            }
        }
    }

    #[test]
    fn test_reset_symbol_not_rechecked_against_first_tone() {
        let mut matcher = MarkerMatcher::new(vec![1000.0, 2000.0, 3000.0], 100.0);
        assert_eq!(matcher.step(1000.0), MatchStep::Continue);
        // Mismatch at index 1 with a symbol equal to the first tone
        assert_eq!(matcher.step(1000.0), MatchStep::Reset);
        assert_eq!(matcher.progress(), 0);
        // So "1000, 2000" here starts over and needs the full sequence again
        assert_eq!(matcher.step(2000.0), MatchStep::Reset);
        assert_eq!(matcher.step(1000.0), MatchStep::Continue);
        assert_eq!(matcher.step(2000.0), MatchStep::Continue);
        assert_eq!(matcher.step(3000.0), MatchStep::Matched);
    }

    #[test]
    fn test_tolerance_is_strict() {
        let mut matcher = MarkerMatcher::new(vec![1000.0, 2000.0], 100.0);
        assert_eq!(matcher.step(1099.0), MatchStep::Continue);
        assert_eq!(matcher.step(2100.0), MatchStep::Reset);
    }

    #[test]
    fn test_reusable_after_match() {
        let mut matcher = start_matcher();
        for _ in 0..2 {
            let steps: Vec<MatchStep> = START_MARKER_FREQS.iter().map(|&f| matcher.step(f)).collect();
            assert_eq!(steps.last(), Some(&MatchStep::Matched));
        }
    }

    #[test]
    fn test_empty_sequence_never_matches() {
        let mut matcher = MarkerMatcher::new(Vec::new(), 100.0);
        assert_eq!(matcher.step(1000.0), MatchStep::Reset);
        assert!(matcher.is_empty());
    }

    #[test]
    fn test_contains_any_tone() {
        let matcher = start_matcher();
        assert!(matcher.contains(17400.0));
        assert!(!matcher.contains(19000.0));
    }
}
