//! The characterization state machine.
//!
//! A [`Controller`] owns every collaborator except the pulse counter, which it
//! shares with the edge callback. It is driven by two entry points:
//!
//! - [`Controller::handle`] / [`Controller::submit_line`] for operator intents
//! - [`Controller::tick`] for the periodic sampling and step activities
//!
//! All timing is taken from the injected clock's millisecond tick counter and
//! compared through [`ticks_diff`], so counter rollover is harmless.

use std::sync::Arc;

use motorbench_traits::{Clock, CommandSource, DutyActuator, Operator, RecordSink, ticks_diff};

use crate::command::{Command, ParseMode, parse_with};
use crate::config::TimingCfg;
use crate::duty::DutyCycleDriver;
use crate::error::{BenchError, Result};
use crate::profile::StepProfile;
use crate::pulse::PulseCounter;
use crate::recorder::{CaptureRecorder, Sample};
use crate::speed::SpeedEstimator;
use crate::status::{Reading, SessionEnd, TickOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerMode {
    #[default]
    Idle,
    Manual,
    Capturing,
}

pub struct Controller<A: DutyActuator, R: RecordSink, O: Operator> {
    pub(crate) pulses: Arc<PulseCounter>,
    pub(crate) estimator: SpeedEstimator,
    pub(crate) driver: DutyCycleDriver<A>,
    pub(crate) recorder: CaptureRecorder<R>,
    pub(crate) operator: O,
    pub(crate) profile: Option<StepProfile>,
    pub(crate) timing: TimingCfg,
    pub(crate) parse_mode: ParseMode,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) mode: ControllerMode,
    pub(crate) last_sample_at: u32,
    pub(crate) last_step_at: u32,
    pub(crate) last_report_at: u32,
    pub(crate) capture_started_at: u32,
    pub(crate) settling_since: Option<u32>,
    pub(crate) last_rpm: u32,
}

impl<A: DutyActuator, R: RecordSink, O: Operator> core::fmt::Debug for Controller<A, R, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("mode", &self.mode)
            .field("duty", &self.driver.duty())
            .field("last_rpm", &self.last_rpm)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl<A: DutyActuator, R: RecordSink, O: Operator> Controller<A, R, O> {
    /// Parse one raw line with the configured rules and act on it.
    pub fn submit_line(&mut self, line: &str) -> Result<()> {
        let command = parse_with(line, self.parse_mode);
        self.handle(command)
    }

    /// Drain every line the source has ready. Returns how many were handled.
    pub fn poll_commands<S: CommandSource + ?Sized>(&mut self, source: &mut S) -> Result<usize> {
        let mut handled = 0;
        while let Some(line) = source.poll_line() {
            self.submit_line(&line)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Apply one operator intent.
    ///
    /// Malformed commands and recoverable rejections are absorbed with a
    /// diagnostic. An actuator failure is returned after the controller has
    /// fallen back to `Idle`.
    pub fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SetDuty(percent) => self.enter_manual(percent),
            Command::StartCapture(step) => self.start_capture(step),
            Command::Malformed(line) => {
                let err = BenchError::MalformedCommand(line);
                tracing::warn!(error = %err, "malformed command ignored");
                self.operator.diagnostic(&err.to_string());
                Ok(())
            }
            Command::Rejected(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, "command rejected");
                self.operator.diagnostic(&format!("rejected: {err}"));
                Ok(())
            }
            Command::Rejected(err) => Err(err.into()),
        }
    }

    /// Run whichever periodic activities are due: sampling first, then the
    /// profile step.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let now = self.clock.ticks_ms();
        let mut outcome = TickOutcome::default();

        let since_sample = ticks_diff(now, self.last_sample_at);
        if since_sample >= self.timing.sample_interval_ms {
            self.last_sample_at = now;
            let pulses = self.pulses.consume_and_reset();
            let rpm = self.estimator.estimate_ms(pulses, since_sample);
            self.last_rpm = rpm;
            tracing::trace!(pulses, interval_ms = since_sample, rpm, "sample");

            let mut recorded = false;
            match self.mode {
                ControllerMode::Capturing => {
                    if !self.settling(now) {
                        let sample = Sample {
                            elapsed_ms: ticks_diff(now, self.capture_started_at),
                            duty_percent: self.driver.duty(),
                            rpm,
                        };
                        match self.recorder.append(sample) {
                            Ok(()) => recorded = true,
                            Err(err) => {
                                outcome.finished = Some(SessionEnd::Aborted(err.clone()));
                                self.abort_capture(&err)?;
                            }
                        }
                    }
                }
                ControllerMode::Manual => {
                    if ticks_diff(now, self.last_report_at) >= self.timing.report_interval_ms {
                        self.last_report_at = now;
                        self.operator.report(self.driver.duty(), rpm);
                    }
                }
                ControllerMode::Idle => {}
            }
            outcome.sampled = Some(Reading {
                rpm,
                pulses,
                interval_ms: since_sample,
                recorded,
            });
        }

        if self.mode == ControllerMode::Capturing
            && ticks_diff(now, self.last_step_at) >= self.timing.step_interval_ms
        {
            self.last_step_at = now;
            self.advance_profile(now, &mut outcome)?;
        }

        Ok(outcome)
    }

    /// Stop the motor and close any unfinished capture as it stands.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.recorder.is_active() {
            tracing::info!("shutdown during capture; session closed unfinished");
        }
        self.recorder.close_unfinished();
        self.profile = None;
        self.settling_since = None;
        self.mode = ControllerMode::Idle;
        self.driver.apply(0)?;
        Ok(())
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn is_capturing(&self) -> bool {
        self.mode == ControllerMode::Capturing
    }

    /// Duty currently applied to the actuator.
    pub fn duty(&self) -> u8 {
        self.driver.duty()
    }

    /// RPM computed on the most recent sampling tick.
    pub fn last_rpm(&self) -> u32 {
        self.last_rpm
    }

    /// Counter to register with the platform's edge interrupt.
    pub fn pulse_counter(&self) -> Arc<PulseCounter> {
        Arc::clone(&self.pulses)
    }

    pub fn profile(&self) -> Option<&StepProfile> {
        self.profile.as_ref()
    }

    pub fn timing(&self) -> &TimingCfg {
        &self.timing
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn operator_mut(&mut self) -> &mut O {
        &mut self.operator
    }

    pub fn actuator(&self) -> &A {
        self.driver.actuator()
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        self.driver.actuator_mut()
    }

    pub fn record_sink(&self) -> &R {
        self.recorder.sink()
    }

    pub fn record_sink_mut(&mut self) -> &mut R {
        self.recorder.sink_mut()
    }

    fn enter_manual(&mut self, percent: u8) -> Result<()> {
        if self.recorder.is_active() {
            tracing::info!("manual duty requested; capture closed unfinished");
        }
        self.recorder.close_unfinished();
        self.profile = None;
        self.settling_since = None;
        if let Err(e) = self.driver.apply(i64::from(percent)) {
            self.mode = ControllerMode::Idle;
            return Err(e);
        }
        // The report throttle keeps running across duty changes.
        self.mode = ControllerMode::Manual;
        tracing::debug!(duty = percent, "mode -> manual");
        self.operator.notice("manual mode enabled");
        Ok(())
    }

    fn start_capture(&mut self, step: u8) -> Result<()> {
        if self.recorder.is_active() {
            tracing::info!("capture restarted; previous session discarded");
        }
        self.profile = None;
        self.settling_since = None;
        if let Err(e) = self.driver.apply(0) {
            self.recorder.close_unfinished();
            self.mode = ControllerMode::Idle;
            return Err(e);
        }

        let profile = StepProfile::new(step);
        let step = profile.step_size();
        let now = self.clock.ticks_ms();
        self.capture_started_at = now;
        self.last_step_at = now;
        self.last_sample_at = now;
        self.pulses.consume_and_reset();
        if self.timing.settle_on_start {
            self.settling_since = Some(now);
        }

        if let Err(err) = self.recorder.open(step, now) {
            tracing::error!(error = %err, "cannot open capture record");
            self.mode = ControllerMode::Idle;
            self.settling_since = None;
            self.operator
                .diagnostic(&format!("cannot open capture record: {err}"));
            return Ok(());
        }
        self.profile = Some(profile);
        self.mode = ControllerMode::Capturing;
        tracing::debug!(step, "mode -> capturing");
        self.operator.notice(&format!("capture started (step {step})"));
        Ok(())
    }

    /// True while inside the post-change settling window. Clears the window
    /// once it has elapsed.
    fn settling(&mut self, now: u32) -> bool {
        match self.settling_since {
            Some(since) if ticks_diff(now, since) < self.timing.settle_ms => true,
            Some(_) => {
                self.settling_since = None;
                false
            }
            None => false,
        }
    }

    fn advance_profile(&mut self, now: u32, outcome: &mut TickOutcome) -> Result<()> {
        let Some(profile) = self.profile.as_mut() else {
            return Ok(());
        };
        let Some(step) = profile.advance() else {
            return Ok(());
        };
        let direction = profile.direction();

        if step.terminal {
            self.profile = None;
            self.settling_since = None;
            self.mode = ControllerMode::Idle;
            let stopped = self.driver.apply(0);
            let end = match self.recorder.finalize() {
                Ok(summary) => {
                    tracing::info!(
                        rows = summary.rows,
                        dropped = summary.dropped,
                        duration_ms = summary.duration_ms,
                        "capture complete"
                    );
                    self.operator
                        .notice(&format!("capture complete: {} samples", summary.rows));
                    SessionEnd::Completed(summary)
                }
                Err(err) => {
                    tracing::error!(error = %err, "capture record could not be finalized");
                    self.operator.diagnostic(&format!("capture aborted: {err}"));
                    SessionEnd::Aborted(err)
                }
            };
            outcome.finished = Some(end);
            stopped?;
            return Ok(());
        }

        match self.driver.apply(i64::from(step.duty)) {
            Ok(duty) => {
                self.recorder.set_direction(direction);
                self.settling_since = Some(now);
                outcome.stepped = Some(duty);
                tracing::debug!(duty, ?direction, "profile step");
                Ok(())
            }
            Err(e) => {
                let err = BenchError::HardwareFault(format!("{e:#}"));
                outcome.finished = Some(SessionEnd::Aborted(err.clone()));
                self.recorder.close_unfinished();
                self.profile = None;
                self.settling_since = None;
                self.mode = ControllerMode::Idle;
                self.operator.diagnostic(&format!("capture aborted: {err}"));
                // Best effort; the original failure is what gets reported.
                let _ = self.driver.apply(0);
                Err(e)
            }
        }
    }

    fn abort_capture(&mut self, err: &BenchError) -> Result<()> {
        tracing::error!(error = %err, "capture aborted");
        self.recorder.close_unfinished();
        self.profile = None;
        self.settling_since = None;
        self.mode = ControllerMode::Idle;
        self.operator.diagnostic(&format!("capture aborted: {err}"));
        self.driver.apply(0)?;
        Ok(())
    }
}
