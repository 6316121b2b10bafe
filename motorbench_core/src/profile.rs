//! Ramp-up/ramp-down duty sequence driven during a capture.
//!
//! Starting at 0 the duty rises by a fixed step (saturating at 100), then falls
//! by the same step (saturating at 0). Reaching 0 on the way down is the
//! terminal step:
//!
//! ```text
//! step 20: 0 20 40 60 80 100 80 60 40 20 0
//! step 30: 0 30 60 90 100 70 40 10 0
//! ```

use serde::Serialize;

use crate::duty::MAX_DUTY;

/// Smallest and largest accepted step sizes.
pub const MIN_STEP: u8 = 1;
pub const MAX_STEP: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

/// One advance of the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileStep {
    pub duty: u8,
    /// The profile is complete; this duty must not start a new plateau.
    pub terminal: bool,
}

#[derive(Debug, Clone)]
pub struct StepProfile {
    step: u8,
    duty: u8,
    direction: Direction,
    finished: bool,
}

impl StepProfile {
    /// New profile at duty 0. `step` is clamped to 1..=100.
    pub fn new(step: u8) -> Self {
        Self {
            step: step.clamp(MIN_STEP, MAX_STEP),
            duty: 0,
            direction: Direction::Ascending,
            finished: false,
        }
    }

    pub fn step_size(&self) -> u8 {
        self.step
    }

    /// Duty of the current plateau.
    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Move to the next plateau. `None` once the terminal step was returned.
    pub fn advance(&mut self) -> Option<ProfileStep> {
        if self.finished {
            return None;
        }
        match self.direction {
            Direction::Ascending => {
                self.duty = self.duty.saturating_add(self.step).min(MAX_DUTY);
                if self.duty >= MAX_DUTY {
                    self.direction = Direction::Descending;
                }
            }
            Direction::Descending => {
                self.duty = self.duty.saturating_sub(self.step);
                if self.duty == 0 {
                    self.finished = true;
                }
            }
        }
        Some(ProfileStep {
            duty: self.duty,
            terminal: self.finished,
        })
    }

    /// Number of `advance` calls a fresh profile accepts, terminal included.
    pub fn step_count(step: u8) -> usize {
        StepProfile::new(step).count()
    }
}

impl Iterator for StepProfile {
    type Item = ProfileStep;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

/// Full duty sequence for `step`, including the initial and the terminal 0.
pub fn sequence(step: u8) -> Vec<u8> {
    std::iter::once(0)
        .chain(StepProfile::new(step).map(|s| s.duty))
        .collect()
}
