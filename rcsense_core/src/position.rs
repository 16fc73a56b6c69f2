//! Weighted-average line position.
//!
//! Channel `i` sits at `i * 1000`, so an array of `n` channels reports
//! positions in `[0, (n - 1) * 1000]`. When no channel sees the line the
//! estimate snaps to the edge the line was last seen nearest.

use crate::calibration::CALIBRATED_MAX;

/// Calibrated values at or below this are ignored in the average.
pub const NOISE_FLOOR: u16 = 50;
/// A calibrated value above this means the line is under the array.
pub const ON_LINE_THRESHOLD: u16 = 200;
/// Distance between neighbouring channels on the position scale.
pub const CHANNEL_SPACING: u32 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinePositionEstimator {
    last_position: u16,
}

impl LinePositionEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn last_position(&self) -> u16 {
        self.last_position
    }

    /// Estimate the position from calibrated values (`0..=1000` each).
    ///
    /// With `invert` each value becomes `1000 - v` before thresholding, for a
    /// light line on a dark surface. Off the line the result is `0` or the far
    /// edge and `last_position` is kept.
    pub fn estimate(&mut self, values: &[u16], invert: bool) -> u16 {
        let Some(last_index) = values.len().checked_sub(1) else {
            return 0;
        };
        let far_edge = last_index as u32 * CHANNEL_SPACING;

        let mut on_line = false;
        // 16 channels of u16::MAX overflow a u32 sum
        let mut weighted: u64 = 0;
        let mut total: u64 = 0;
        for (i, &raw) in values.iter().enumerate() {
            let v = if invert {
                CALIBRATED_MAX.saturating_sub(raw)
            } else {
                raw
            };
            if v > ON_LINE_THRESHOLD {
                on_line = true;
            }
            if v > NOISE_FLOOR {
                weighted += u64::from(v) * u64::from(i as u32 * CHANNEL_SPACING);
                total += u64::from(v);
            }
        }

        if !on_line || total == 0 {
            let edge = if u32::from(self.last_position) < far_edge / 2 {
                0
            } else {
                far_edge
            };
            return edge as u16;
        }

        self.last_position = (weighted / total) as u16;
        self.last_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[1000, 1000, 0, 0, 0], 500)]
    #[case(&[0, 0, 1000, 0, 0], 2000)]
    #[case(&[0, 0, 0, 0, 1000], 4000)]
    #[case(&[0, 0, 500, 500, 0], 2500)]
    #[case(&[40, 0, 0, 0, 300], 4000)]
    fn weighted_average(#[case] values: &[u16], #[case] expected: u16) {
        let mut e = LinePositionEstimator::new();
        assert_eq!(e.estimate(values, false), expected);
        assert_eq!(e.last_position(), expected);
    }

    #[test]
    fn off_line_snaps_to_last_seen_edge() {
        let mut e = LinePositionEstimator::new();
        assert_eq!(e.estimate(&[0; 5], false), 0);
        e.estimate(&[0, 0, 0, 300, 1000], false);
        let last = e.last_position();
        assert!(last > 2000);
        assert_eq!(e.estimate(&[10; 5], false), 4000);
        // sticky edge does not overwrite the memory
        assert_eq!(e.last_position(), last);
    }

    #[test]
    fn out_of_scale_values_do_not_overflow() {
        let mut e = LinePositionEstimator::new();
        assert_eq!(e.estimate(&[u16::MAX; 16], false), 7500);
        let mut skewed = [0u16; 16];
        skewed[15] = u16::MAX;
        assert_eq!(e.estimate(&skewed, false), 15_000);
        // inverted out-of-scale values saturate to zero and read as off the line
        assert_eq!(e.estimate(&[u16::MAX; 16], true), 15_000);
    }

    #[test]
    fn exactly_at_midpoint_goes_far() {
        let mut e = LinePositionEstimator::new();
        e.estimate(&[0, 1000, 0], false);
        assert_eq!(e.last_position(), 1000);
        assert_eq!(e.estimate(&[0, 0, 0], false), 2000);
    }

    #[test]
    fn invert_applies_before_threshold() {
        let mut e = LinePositionEstimator::new();
        // white line under channel 3 on a black surface
        assert_eq!(e.estimate(&[1000, 1000, 1000, 0, 1000], true), 3000);
        // all black with invert: everything below the noise floor
        assert_eq!(e.estimate(&[1000; 5], true), 4000);
    }

    #[test]
    fn signal_between_threshold_and_floor_counts_only_when_on_line() {
        let mut e = LinePositionEstimator::new();
        // 150 is averaged in but does not put us on the line
        assert_eq!(e.estimate(&[150, 0, 0], false), 0);
        assert_eq!(e.last_position(), 0);
        assert_eq!(e.estimate(&[150, 0, 150, 0, 300], false), 2500);
    }

    #[test]
    fn empty_and_single_channel() {
        let mut e = LinePositionEstimator::new();
        assert_eq!(e.estimate(&[], false), 0);
        assert_eq!(e.estimate(&[900], false), 0);
        assert_eq!(e.estimate(&[0], false), 0);
    }
}
