//! Type-state builder for [`Controller`].
//!
//! The actuator, record sink and operator are type parameters that start out
//! as [`Missing`]; `build()` only exists once all three are real collaborators.

use std::sync::Arc;

use motorbench_traits::{Clock, DutyActuator, MonotonicClock, Operator, RecordSink};

use crate::command::ParseMode;
use crate::config::{EncoderCfg, RecordCfg, RecordMode, TimingCfg};
use crate::controller::{Controller, ControllerMode};
use crate::duty::DutyCycleDriver;
use crate::error::{BuildError, Result};
use crate::pulse::PulseCounter;
use crate::recorder::CaptureRecorder;
use crate::speed::SpeedEstimator;

/// Controller with boxed collaborators, for callers choosing backends at runtime.
pub type BoxedController = Controller<
    Box<dyn DutyActuator + Send>,
    Box<dyn RecordSink + Send>,
    Box<dyn Operator + Send>,
>;

// ── Type-state marker ────────────────────────────────────────────────────────

/// Placeholder for a collaborator that has not been provided yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct Missing;

pub struct ControllerBuilder<A, R, O> {
    actuator: A,
    sink: R,
    operator: O,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    timing: Option<TimingCfg>,
    encoder: Option<EncoderCfg>,
    record: Option<RecordCfg>,
    parse_mode: Option<ParseMode>,
    pulses: Option<Arc<PulseCounter>>,
}

impl ControllerBuilder<Missing, Missing, Missing> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ControllerBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            actuator: Missing,
            sink: Missing,
            operator: Missing,
            clock: None,
            timing: None,
            encoder: None,
            record: None,
            parse_mode: None,
            pulses: None,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<A, R, O> ControllerBuilder<A, R, O> {
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_encoder(mut self, encoder: EncoderCfg) -> Self {
        self.encoder = Some(encoder);
        self
    }
    pub fn with_record_cfg(mut self, record: RecordCfg) -> Self {
        self.record = Some(record);
        self
    }
    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = Some(mode);
        self
    }
    /// Share an existing counter, e.g. one already wired to an interrupt.
    pub fn with_pulse_counter(mut self, pulses: Arc<PulseCounter>) -> Self {
        self.pulses = Some(pulses);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<R, O> ControllerBuilder<Missing, R, O> {
    pub fn with_actuator<A: DutyActuator>(self, actuator: A) -> ControllerBuilder<A, R, O> {
        ControllerBuilder {
            actuator,
            sink: self.sink,
            operator: self.operator,
            clock: self.clock,
            timing: self.timing,
            encoder: self.encoder,
            record: self.record,
            parse_mode: self.parse_mode,
            pulses: self.pulses,
        }
    }
}

impl<A, O> ControllerBuilder<A, Missing, O> {
    pub fn with_record_sink<R: RecordSink>(self, sink: R) -> ControllerBuilder<A, R, O> {
        ControllerBuilder {
            actuator: self.actuator,
            sink,
            operator: self.operator,
            clock: self.clock,
            timing: self.timing,
            encoder: self.encoder,
            record: self.record,
            parse_mode: self.parse_mode,
            pulses: self.pulses,
        }
    }
}

impl<A, R> ControllerBuilder<A, R, Missing> {
    pub fn with_operator<O: Operator>(self, operator: O) -> ControllerBuilder<A, R, O> {
        ControllerBuilder {
            actuator: self.actuator,
            sink: self.sink,
            operator,
            clock: self.clock,
            timing: self.timing,
            encoder: self.encoder,
            record: self.record,
            parse_mode: self.parse_mode,
            pulses: self.pulses,
        }
    }
}

impl<A: DutyActuator, R: RecordSink, O: Operator> ControllerBuilder<A, R, O> {
    /// Validate and build the controller in `Idle` mode. The actuator is not
    /// touched until the first command.
    pub fn build(self) -> Result<Controller<A, R, O>> {
        let timing = self.timing.unwrap_or_default();
        let encoder = self.encoder.unwrap_or_default();
        let record = self.record.unwrap_or_default();
        validate(&timing, &encoder, &record).map_err(eyre::Report::new)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let now = clock.ticks_ms();

        Ok(Controller {
            pulses: self.pulses.unwrap_or_default(),
            estimator: SpeedEstimator::new(encoder.pulses_per_revolution),
            driver: DutyCycleDriver::new(self.actuator),
            recorder: CaptureRecorder::new(self.sink, record),
            operator: self.operator,
            profile: None,
            timing,
            parse_mode: self.parse_mode.unwrap_or_default(),
            clock,
            mode: ControllerMode::Idle,
            last_sample_at: now,
            last_step_at: now,
            last_report_at: now,
            capture_started_at: now,
            settling_since: None,
            last_rpm: 0,
        })
    }
}

fn validate(
    timing: &TimingCfg,
    encoder: &EncoderCfg,
    record: &RecordCfg,
) -> std::result::Result<(), BuildError> {
    if timing.sample_interval_ms == 0 {
        return Err(BuildError::InvalidConfig("sample_interval_ms must be > 0"));
    }
    if timing.step_interval_ms == 0 {
        return Err(BuildError::InvalidConfig("step_interval_ms must be > 0"));
    }
    if timing.report_interval_ms == 0 {
        return Err(BuildError::InvalidConfig("report_interval_ms must be > 0"));
    }
    if timing.settle_ms >= timing.step_interval_ms {
        return Err(BuildError::InvalidConfig(
            "settle_ms must be shorter than step_interval_ms",
        ));
    }
    if encoder.pulses_per_revolution == 0 {
        return Err(BuildError::InvalidConfig(
            "pulses_per_revolution must be > 0",
        ));
    }
    if record.mode == RecordMode::Buffered && record.max_samples == 0 {
        return Err(BuildError::InvalidConfig(
            "max_samples must be > 0 in buffered mode",
        ));
    }
    Ok(())
}
