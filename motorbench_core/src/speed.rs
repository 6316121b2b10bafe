//! Pulse count to shaft speed conversion.

use std::time::Duration;

/// Seconds per minute.
const SECS_PER_MIN: f64 = 60.0;

/// Convert `pulse_count` edges observed over `elapsed_seconds` into RPM.
///
/// `rpm = round(pulse_count / pulses_per_revolution / elapsed_seconds * 60)`
///
/// Rounds to nearest with ties away from zero. Returns 0 for a non-positive or
/// non-finite interval and for `pulses_per_revolution == 0`. Saturates at
/// `u32::MAX`.
pub fn estimate_rpm(pulse_count: u32, elapsed_seconds: f64, pulses_per_revolution: u32) -> u32 {
    if !(elapsed_seconds.is_finite() && elapsed_seconds > 0.0) || pulses_per_revolution == 0 {
        return 0;
    }
    let rpm = f64::from(pulse_count) * SECS_PER_MIN
        / (f64::from(pulses_per_revolution) * elapsed_seconds);
    let rounded = rpm.round();
    if !rounded.is_finite() {
        return 0;
    }
    if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

/// Speed estimator bound to a fixed encoder resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedEstimator {
    pulses_per_revolution: u32,
}

impl SpeedEstimator {
    pub fn new(pulses_per_revolution: u32) -> Self {
        Self {
            pulses_per_revolution,
        }
    }

    pub fn pulses_per_revolution(&self) -> u32 {
        self.pulses_per_revolution
    }

    pub fn estimate(&self, pulse_count: u32, elapsed: Duration) -> u32 {
        estimate_rpm(pulse_count, elapsed.as_secs_f64(), self.pulses_per_revolution)
    }

    /// Estimate over a whole-millisecond tick interval.
    pub fn estimate_ms(&self, pulse_count: u32, elapsed_ms: u32) -> u32 {
        estimate_rpm(
            pulse_count,
            f64::from(elapsed_ms) / 1000.0,
            self.pulses_per_revolution,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.004, 20, 0)]
    #[case(5, 0.0, 20, 0)]
    #[case(5, -1.0, 20, 0)]
    #[case(5, f64::NAN, 20, 0)]
    #[case(5, 0.004, 0, 0)]
    // 2 edges in 4 ms at 20 ppr: 0.1 rev / 0.004 s = 25 rps
    #[case(2, 0.004, 20, 1500)]
    #[case(20, 1.0, 20, 60)]
    // 1 edge in 7 ms: 428.57 rpm
    #[case(1, 0.007, 20, 429)]
    // 1 edge in 8 ms: exactly 375
    #[case(1, 0.008, 20, 375)]
    fn estimate_table(
        #[case] pulses: u32,
        #[case] secs: f64,
        #[case] ppr: u32,
        #[case] expected: u32,
    ) {
        assert_eq!(estimate_rpm(pulses, secs, ppr), expected);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(estimate_rpm(u32::MAX, 1e-9, 1), u32::MAX);
    }

    #[test]
    fn estimator_uses_tick_interval() {
        let est = SpeedEstimator::new(20);
        assert_eq!(est.estimate_ms(2, 4), 1500);
        assert_eq!(est.estimate_ms(2, 0), 0);
        assert_eq!(est.estimate(2, Duration::from_millis(4)), 1500);
    }
}
