//! Per-tick outcome returned from the control loop.

use crate::error::BenchError;
use crate::recorder::CaptureSummary;

/// What a single `Controller::tick` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Set when the sampling tick fired.
    pub sampled: Option<Reading>,
    /// Duty applied by the step tick, if it fired.
    pub stepped: Option<u8>,
    /// Set when a capture session ended during this tick.
    pub finished: Option<SessionEnd>,
}

impl TickOutcome {
    pub fn is_idle(&self) -> bool {
        self.sampled.is_none() && self.stepped.is_none() && self.finished.is_none()
    }
}

/// One speed measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub rpm: u32,
    pub pulses: u32,
    /// Measured time since the previous sampling tick.
    pub interval_ms: u32,
    /// The reading was appended to the capture record.
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Profile finished; record persisted.
    Completed(CaptureSummary),
    /// Session dropped after a storage failure.
    Aborted(BenchError),
}
