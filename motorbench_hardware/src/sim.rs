//! Simulated test rig: a PWM-driven motor model and an encoder thread.
//!
//! The motor's speed follows a first-order lag toward a duty-dependent target.
//! The encoder thread integrates that speed into edges and delivers them to an
//! [`EdgeHandler`] from its own thread, the same way a GPIO interrupt would.
//!
//! Each `SimulatedEncoder` owns exactly one thread, shut down and joined when
//! the encoder is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use motorbench_traits::{BoxError, DutyActuator, EdgeHandler};

/// First-order DC motor model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorModel {
    /// Steady-state speed at 100% duty.
    pub max_rpm: f64,
    pub time_constant: Duration,
    /// Duty at or below which the shaft does not turn.
    pub deadband_percent: u8,
    pub pulses_per_revolution: u32,
}

impl Default for MotorModel {
    fn default() -> Self {
        Self {
            max_rpm: 3000.0,
            time_constant: Duration::from_millis(150),
            deadband_percent: 5,
            pulses_per_revolution: 20,
        }
    }
}

impl MotorModel {
    /// Steady-state speed for `duty` percent.
    pub fn target_rpm(&self, duty: u8) -> f64 {
        let duty = duty.min(100);
        if duty <= self.deadband_percent || self.deadband_percent >= 100 {
            return 0.0;
        }
        let span = f64::from(100 - self.deadband_percent);
        self.max_rpm * f64::from(duty - self.deadband_percent) / span
    }

    /// Speed after `dt` starting from `rpm` with `duty` applied.
    pub fn advance(&self, rpm: f64, duty: u8, dt: Duration) -> f64 {
        let target = self.target_rpm(duty);
        let tau = self.time_constant.as_secs_f64();
        if tau <= 0.0 {
            return target;
        }
        let k = 1.0 - (-dt.as_secs_f64() / tau).exp();
        rpm + (target - rpm) * k
    }
}

/// Turns a speed trace into whole edges, carrying the fractional remainder.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeSynth {
    carry: f64,
}

impl EdgeSynth {
    /// Edges produced by spinning at `rpm` for `dt`.
    pub fn edges(&mut self, rpm: f64, dt: Duration, pulses_per_revolution: u32) -> u32 {
        let revs = rpm.max(0.0) / 60.0 * dt.as_secs_f64();
        self.carry += revs * f64::from(pulses_per_revolution);
        let whole = self.carry.floor();
        self.carry -= whole;
        whole.min(f64::from(u32::MAX)) as u32
    }
}

/// Duty actuator that only stores the requested duty for the encoder thread.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotor {
    duty: Arc<AtomicU8>,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared duty cell read by the encoder thread.
    pub fn duty_cell(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.duty)
    }

    pub fn duty(&self) -> u8 {
        self.duty.load(Ordering::Acquire)
    }
}

impl DutyActuator for SimulatedMotor {
    fn set_duty(&mut self, percent: u8) -> Result<(), BoxError> {
        tracing::trace!(percent, "simulated duty");
        self.duty.store(percent.min(100), Ordering::Release);
        Ok(())
    }
}

pub struct SimulatedEncoder {
    rpm: Arc<AtomicU32>,
    /// Shutdown flag checked by the thread every step
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl SimulatedEncoder {
    /// Spawn the encoder thread. It wakes every `step`, advances the model
    /// with the elapsed wall time and emits the resulting edges.
    pub fn spawn(
        model: MotorModel,
        duty: Arc<AtomicU8>,
        handler: Arc<dyn EdgeHandler>,
        step: Duration,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let rpm = Arc::new(AtomicU32::new(0));
        let rpm_clone = Arc::clone(&rpm);

        let join_handle = std::thread::Builder::new()
            .name("sim-encoder".into())
            .spawn(move || {
                let mut speed = 0.0f64;
                let mut synth = EdgeSynth::default();
                let mut last = Instant::now();
                while !shutdown_clone.load(Ordering::Relaxed) {
                    std::thread::sleep(step);
                    let now = Instant::now();
                    let dt = now.saturating_duration_since(last);
                    last = now;

                    speed = model.advance(speed, duty.load(Ordering::Acquire), dt);
                    rpm_clone.store(speed.round() as u32, Ordering::Relaxed);
                    for _ in 0..synth.edges(speed, dt, model.pulses_per_revolution) {
                        handler.on_edge();
                    }
                }
                tracing::trace!("simulated encoder thread exiting cleanly");
            })?;

        Ok(Self {
            rpm,
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    /// Model speed at the last step (ground truth for comparisons).
    pub fn true_rpm(&self) -> u32 {
        self.rpm.load(Ordering::Relaxed)
    }
}

impl Drop for SimulatedEncoder {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("simulated encoder joined"),
                Err(e) => tracing::warn!(?e, "simulated encoder thread panicked during shutdown"),
            }
        }
    }
}

/// Build a motor and a running encoder wired to `handler`.
pub fn simulated_rig(
    model: MotorModel,
    handler: Arc<dyn EdgeHandler>,
) -> std::io::Result<(SimulatedMotor, SimulatedEncoder)> {
    let motor = SimulatedMotor::new();
    let encoder = SimulatedEncoder::spawn(model, motor.duty_cell(), handler, Duration::from_millis(1))?;
    Ok((motor, encoder))
}
