//! Bounded duty-cycle output.

use eyre::WrapErr;
use motorbench_traits::DutyActuator;
pub use motorbench_traits::to_native;

use crate::error::Result;
use crate::hw_error::map_hw_error;

/// Highest duty percentage.
pub const MAX_DUTY: u8 = 100;

/// Saturate an arbitrary request into 0..=100.
#[inline]
pub fn clamp_percent(percent: i64) -> u8 {
    percent.clamp(0, i64::from(MAX_DUTY)) as u8
}

/// Thin wrapper over the actuator that saturates requests and remembers the
/// value last applied.
pub struct DutyCycleDriver<A: DutyActuator> {
    actuator: A,
    duty: u8,
}

impl<A: DutyActuator> core::fmt::Debug for DutyCycleDriver<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DutyCycleDriver")
            .field("duty", &self.duty)
            .finish()
    }
}

impl<A: DutyActuator> DutyCycleDriver<A> {
    /// Wrap an actuator. The actuator is not touched until the first `apply`.
    pub fn new(actuator: A) -> Self {
        Self { actuator, duty: 0 }
    }

    /// Clamp `percent` to 0..=100 and forward it. Returns the applied value.
    pub fn apply(&mut self, percent: i64) -> Result<u8> {
        let duty = clamp_percent(percent);
        if i64::from(duty) != percent {
            tracing::debug!(requested = percent, applied = duty, "duty saturated");
        }
        self.actuator
            .set_duty(duty)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("set_duty")?;
        self.duty = duty;
        Ok(duty)
    }

    /// Last successfully applied duty.
    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingActuator;
    use rstest::rstest;

    #[rstest]
    #[case(-5, 0)]
    #[case(0, 0)]
    #[case(42, 42)]
    #[case(100, 100)]
    #[case(150, 100)]
    #[case(i64::MIN, 0)]
    #[case(i64::MAX, 100)]
    fn apply_saturates(#[case] requested: i64, #[case] expected: u8) {
        let mut driver = DutyCycleDriver::new(RecordingActuator::default());
        assert_eq!(driver.apply(requested).unwrap(), expected);
        assert_eq!(driver.duty(), expected);
        assert_eq!(driver.actuator().history(), &[expected]);
    }

    #[test]
    fn repeated_apply_is_idempotent() {
        let mut driver = DutyCycleDriver::new(RecordingActuator::default());
        driver.apply(60).unwrap();
        driver.apply(60).unwrap();
        assert_eq!(driver.duty(), 60);
        assert_eq!(driver.actuator().current(), Some(60));
    }

    #[test]
    fn failed_apply_keeps_previous_duty() {
        let mut driver = DutyCycleDriver::new(RecordingActuator::default());
        driver.apply(30).unwrap();
        driver.actuator_mut().fail_next("h-bridge fault");
        let err = driver.apply(70).expect_err("actuator failure surfaces");
        assert!(format!("{err:#}").contains("h-bridge fault"));
        assert_eq!(driver.duty(), 30);
    }

    #[rstest]
    #[case(0, 65535, 0)]
    #[case(50, 65535, 32767)]
    #[case(100, 65535, 65535)]
    #[case(37, 10_000, 3700)]
    #[case(200, 10_000, 10_000)]
    fn native_mapping(#[case] percent: u8, #[case] full: u32, #[case] expected: u32) {
        assert_eq!(to_native(percent, full), expected);
    }
}
