//! Cooperative control loop.
//!
//! Each pass polls commands, runs the controller's periodic activities and
//! then sleeps on the controller's clock. With a `ManualClock` the sleep just
//! advances simulated time, which makes whole runs deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use motorbench_traits::{CommandSource, DutyActuator, Operator, RecordSink};

use crate::controller::Controller;
use crate::error::Result;
use crate::status::SessionEnd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    /// Sleep between passes. Keep well below the sampling interval.
    pub idle_sleep: Duration,
    /// Return as soon as a capture session ends.
    pub stop_after_capture: bool,
    /// Return once the command source is closed and no capture is running.
    pub stop_on_eof: bool,
    /// Measure per-pass latency.
    pub stats: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_micros(500),
            stop_after_capture: false,
            stop_on_eof: true,
            stats: false,
        }
    }
}

/// Loop statistics returned by [`run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: u64,
    pub samples: u64,
    /// Rows appended to capture records.
    pub recorded: u64,
    /// Sampling ticks skipped because a pass ran late.
    pub missed_deadlines: u64,
    /// Longest pass, excluding the idle sleep. Only with `stats`.
    pub max_latency_us: u64,
    pub last_session: Option<SessionEnd>,
}

/// Sampling ticks that should have fired but were folded into a late one.
#[inline]
fn missed_ticks(interval_ms: u32, sample_interval_ms: u32) -> u64 {
    if sample_interval_ms == 0 {
        return 0;
    }
    u64::from((interval_ms / sample_interval_ms).saturating_sub(1))
}

/// Drive `controller` until `shutdown` is raised or a stop condition in
/// `params` is met. The motor is stopped before returning, on success and on
/// error.
pub fn run<A, R, O, S>(
    controller: &mut Controller<A, R, O>,
    source: &mut S,
    shutdown: &AtomicBool,
    params: RunParams,
) -> Result<RunSummary>
where
    A: DutyActuator,
    R: RecordSink,
    O: Operator,
    S: CommandSource + ?Sized,
{
    let result = run_passes(controller, source, shutdown, params);
    match &result {
        Ok(summary) => tracing::info!(
            passes = summary.passes,
            samples = summary.samples,
            missed = summary.missed_deadlines,
            "control loop stopped"
        ),
        Err(e) => tracing::error!(error = %e, "control loop failed"),
    }
    let stopped = controller.shutdown();
    let summary = result?;
    stopped?;
    Ok(summary)
}

fn run_passes<A, R, O, S>(
    controller: &mut Controller<A, R, O>,
    source: &mut S,
    shutdown: &AtomicBool,
    params: RunParams,
) -> Result<RunSummary>
where
    A: DutyActuator,
    R: RecordSink,
    O: Operator,
    S: CommandSource + ?Sized,
{
    let clock = std::sync::Arc::clone(controller.clock());
    let sample_interval_ms = controller.timing().sample_interval_ms;
    let mut summary = RunSummary::default();

    while !shutdown.load(Ordering::Acquire) {
        let pass_start = params.stats.then(|| clock.now());

        controller.poll_commands(source)?;
        let outcome = controller.tick()?;
        summary.passes += 1;

        if let Some(reading) = outcome.sampled {
            summary.samples += 1;
            if reading.recorded {
                summary.recorded += 1;
            }
            summary.missed_deadlines += missed_ticks(reading.interval_ms, sample_interval_ms);
        }
        if let Some(start) = pass_start {
            let us = clock.now().saturating_duration_since(start).as_micros();
            summary.max_latency_us = summary.max_latency_us.max(us.min(u128::from(u64::MAX)) as u64);
        }

        if let Some(end) = outcome.finished {
            let stop = params.stop_after_capture;
            summary.last_session = Some(end);
            if stop {
                break;
            }
        }
        if params.stop_on_eof && source.is_closed() && !controller.is_capturing() {
            tracing::debug!("command input closed");
            break;
        }

        clock.sleep(params.idle_sleep);
    }

    Ok(summary)
}
